use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Invalid coordinate: ({lat}, {lon}) is outside lat [-90, 90], lon [-180, 180]")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Non-finite input: {0}")]
    NonFiniteInput(String),

    #[error("Vincenty formula failed to converge after {iterations} iterations")]
    Convergence { iterations: usize },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Expected 1 or 2 coordinate collections, got {0}")]
    InvalidCollections(usize),

    #[error("Partition for rows {}..{} failed: {source}", rows.0, rows.1)]
    PartitionExecution {
        rows: (usize, usize),
        #[source]
        source: Box<GeoError>,
    },

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl GeoError {
    /// Unwrap partition wrappers down to the error raised by the cell itself.
    pub fn root_cause(&self) -> &GeoError {
        match self {
            Self::PartitionExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
