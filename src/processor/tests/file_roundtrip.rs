//! Import, coding and export through files

use crate::config::{CoderConfig, RegistryFilter};
use crate::error::CoderError;
use crate::models::BatchStats;
use crate::processor::reader::read_station_csv;
use crate::processor::writer::write_station_csv;
use crate::processor::{BatchProcessor, BatchResult};
use crate::registry::CsvRegistry;
use std::fs;
use tempfile::TempDir;

const IMPORT: &str = "\
Nome,Latitude,Longitude,Codigo,Altitude,Telemetrica,Observador
Sítio Novo,-6.81,-37.2,,245,Sim,Maria
Sem Coordenada,,-37.5,,,,
Serra Branca,-6.4,-37.66,0006037001,510,Não,
Fazenda Velha,-6.02,-37.1,,alto,,João
";

const REGISTRY: &str = "\
Codigo,TipoEstacao,Importado,Removido,Temporario,ImportadoRepetido
6037000,2,0,0,0,0
0006037002,2,0,0,0,0
0006037003,1,0,0,0,0
";

#[test]
fn test_import_code_and_export() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("estacoes.csv");
    let registry_path = temp_dir.path().join("registro.csv");
    let output_path = temp_dir.path().join("saida").join("estacoes_codificadas.csv");
    fs::write(&input_path, IMPORT).unwrap();
    fs::write(&registry_path, REGISTRY).unwrap();

    let batch = read_station_csv(&input_path, b',').unwrap();
    let registry = CsvRegistry::load(&registry_path, &RegistryFilter::default(), b',').unwrap();
    let result = BatchProcessor::new(CoderConfig::default())
        .process(batch.records, &registry)
        .unwrap();

    let written = write_station_csv(&output_path, &batch.columns, &result, b',').unwrap();
    assert_eq!(written, 4);

    let exported = read_station_csv(&output_path, b',').unwrap();
    assert_eq!(
        exported.columns,
        [
            "Nome",
            "Latitude",
            "Longitude",
            "Codigo",
            "Altitude",
            "Telemetrica",
            "Observador",
            "Status",
            "Observacao"
        ]
    );

    let rows = &exported.records;
    // 000 and 002 are in the registry, 001 is reserved by Serra Branca
    assert_eq!(rows[0].get("Codigo"), Some("0006037003"));
    assert_eq!(rows[0].get("Status"), Some("Codificada"));
    assert_eq!(rows[0].get("Observador"), Some("Maria"));
    assert_eq!(rows[0].get("Telemetrica"), Some("Sim"));
    assert_eq!(rows[0].get("Observacao"), None);

    assert_eq!(rows[1].get("Codigo"), None);
    assert_eq!(rows[1].get("Status"), Some("Rejeitada"));
    assert_eq!(
        rows[1].get("Observacao"),
        Some("Missing required field: Latitude")
    );

    assert_eq!(rows[2].get("Codigo"), Some("0006037001"));
    assert_eq!(rows[2].get("Status"), Some("Ignorada"));

    assert_eq!(rows[3].get("Codigo"), Some("0006037004"));
    assert_eq!(rows[3].get("Altitude"), Some("alto"));
    assert!(rows[3].get("Observacao").unwrap().contains("Altitude"));
}

#[test]
fn test_export_refuses_empty_batch() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().join("vazio.csv");
    let result = BatchResult {
        outcomes: Vec::new(),
        stats: BatchStats::default(),
    };

    let written = write_station_csv(&output_path, &["Nome".to_string()], &result, b',');

    assert!(matches!(written, Err(CoderError::EmptyBatch)));
    assert!(!output_path.exists());
}

#[test]
fn test_export_keeps_code_of_rejected_row() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("estacoes.csv");
    let output_path = temp_dir.path().join("estacoes_codificadas.csv");
    fs::write(
        &input_path,
        "Nome,Latitude,Longitude,Codigo\n,-6.5,-37.5,0006037000\nNova,-6.81,-37.2,\n",
    )
    .unwrap();

    let batch = read_station_csv(&input_path, b',').unwrap();
    let result = BatchProcessor::new(CoderConfig::default())
        .process(batch.records, &crate::registry::InMemoryRegistry::new())
        .unwrap();
    write_station_csv(&output_path, &batch.columns, &result, b',').unwrap();

    let rows = read_station_csv(&output_path, b',').unwrap().records;
    assert_eq!(rows[0].get("Codigo"), Some("0006037000"));
    assert_eq!(rows[0].get("Status"), Some("Rejeitada"));
    assert_eq!(rows[1].get("Codigo"), Some("0006037001"));
    assert_eq!(rows[1].get("Status"), Some("Codificada"));
}
