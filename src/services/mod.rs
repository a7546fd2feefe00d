pub mod ledger;
pub mod settings;
pub mod uploads;

pub use settings::SettingsStore;
pub use uploads::{UploadError, UploadStore};
