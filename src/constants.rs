//! Application constants for the station coder
//!
//! Field names of the import layout, the fixed widths of the national
//! station code, and the value spellings accepted when coercing optional
//! attributes.

// =============================================================================
// Station Code Layout
// =============================================================================

/// Leading digit of every rainfall station code (stations off the watercourse)
pub const LEADING_DIGIT: char = '0';

/// Offset added to the degree of latitudes north of the Equator
pub const NORTHERN_LATITUDE_OFFSET: u16 = 80;

/// Width of the zero-padded latitude and longitude bands
pub const BAND_WIDTH: usize = 3;

/// Width of the sequential suffix
pub const SUFFIX_WIDTH: usize = 3;

/// Highest sequential suffix available in a grid cell
pub const MAX_SUFFIX: u16 = 999;

/// Length of the coordinate-derived prefix (`0LLLOOO`)
pub const PARTIAL_CODE_LEN: usize = 1 + 2 * BAND_WIDTH;

/// Length of a complete station code (`0LLLOOONNN`)
pub const STATION_CODE_LEN: usize = PARTIAL_CODE_LEN + SUFFIX_WIDTH;

/// Valid latitude range in decimal degrees
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

/// Valid longitude range in decimal degrees
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

// =============================================================================
// Import Layout
// =============================================================================

/// Column names of the `Estacoes_Novas` import table
pub mod fields {
    pub const NAME: &str = "Nome";
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";
    pub const CODE: &str = "Codigo";

    /// Columns that must exist in the header of an import file
    pub const REQUIRED: &[&str] = &[NAME, LATITUDE, LONGITUDE];

    /// Integer identifiers of related registry entities
    pub const INTEGER_ATTRIBUTES: &[&str] = &[
        "BaciaCodigo",
        "SubBaciaCodigo",
        "RioCodigo",
        "MunicipioCodigo",
        "EstadoCodigo",
        "ResponsavelCodigo",
    ];

    /// Decimal measurements
    pub const DECIMAL_ATTRIBUTES: &[&str] = &["Altitude", "AreaDrenagem"];

    /// Yes/no capability flags
    pub const FLAG_ATTRIBUTES: &[&str] = &[
        "Escala",
        "DescargaLiquida",
        "Descarga Liquida",
        "Sedimentos",
        "QualidadeAgua",
        "Pluviometro",
        "Telemetrica",
        "Operando",
    ];

    /// Descriptive text carried through as-is
    pub const TEXT_ATTRIBUTES: &[&str] = &[
        "CodigoAdicional",
        "BaciaNome",
        "SubBaciaNome",
        "RioNome",
        "EstadoSigla",
        "MunicipioNome",
        "ResponsavelNome",
        "ResponsavelSigla",
        "EstacaoTipo",
    ];

    /// Columns appended to the export
    pub const STATUS: &str = "Status";
    pub const NOTE: &str = "Observacao";
}

/// Spellings accepted for capability flags (compared case-insensitively)
pub mod flag_values {
    pub const TRUTHY: &[&str] = &["SIM", "S", "TRUE", "1", "YES", "Y"];
    pub const FALSY: &[&str] = &["NAO", "NÃO", "N", "FALSE", "0", "NO"];
}

/// Status labels written to the export
pub mod status_labels {
    pub const CODED: &str = "Codificada";
    pub const SKIPPED: &str = "Ignorada";
    pub const REJECTED: &str = "Rejeitada";
}

// =============================================================================
// Registry Export Layout
// =============================================================================

pub mod registry {
    /// Station type of rainfall stations in the national registry
    pub const RAINFALL_STATION_TYPE: i64 = 2;

    pub const CODE_COLUMN: &str = "Codigo";
    pub const STATION_TYPE_COLUMN: &str = "TipoEstacao";

    /// Rows with any of these flags set are not live registry entries
    pub const EXCLUSION_FLAG_COLUMNS: &[&str] = &[
        "Importado",
        "Removido",
        "Temporario",
        "ImportadoRepetido",
    ];
}

// =============================================================================
// Output Defaults
// =============================================================================

/// Suffix appended to the import file stem for the default export path
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_codificadas";

/// Default CSV field separator
pub const DEFAULT_DELIMITER: u8 = b',';
