mod parsing;
mod secret;
mod settings;
mod types;

pub(crate) use secret::SecretString;
pub(crate) use types::{GradingContract, Settings, StorageSettings};
