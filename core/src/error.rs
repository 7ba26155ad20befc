use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Malformed action sequence: {0}")]
    SequenceStructure(String),

    #[error("Action '{0}' is unknown")]
    UnknownAction(String),

    #[error("Event '{0}' is unknown")]
    UnknownEvent(String),

    #[error("Sequence entry {index} ('{name}') failed to load: {source}")]
    SequenceLoad {
        index: usize,
        name: String,
        #[source]
        source: Box<KernelError>,
    },

    #[error("Object type '{0}' is unknown")]
    UnknownObjectType(String),

    #[error("Language engine error: {0}")]
    Language(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type KernelResult<T> = Result<T, KernelError>;
