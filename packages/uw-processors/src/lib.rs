pub mod application;
pub mod bank_statement;
pub mod drivers_license;

pub use application::TestApplicationProcessor;
pub use bank_statement::TestBankStatementProcessor;
pub use drivers_license::TestDriversLicenseProcessor;

use std::sync::Arc;
use uw_core::{Processor, ProcessorConstructor};

/// The statically imported list consumed once at startup by
/// `uw_core::Registry::from_constructors`, replacing filesystem-scanning
/// auto-discovery with an explicit build-time list.
pub const ALL_PROCESSORS: &[(&str, ProcessorConstructor)] = &[
    ("test_application_processor", make_application),
    ("test_bank_statement_processor", make_bank_statement),
    ("test_drivers_license_processor", make_drivers_license),
];

fn make_application() -> Arc<dyn Processor> {
    Arc::new(TestApplicationProcessor)
}

fn make_bank_statement() -> Arc<dyn Processor> {
    Arc::new(TestBankStatementProcessor)
}

fn make_drivers_license() -> Arc<dyn Processor> {
    Arc::new(TestDriversLicenseProcessor)
}
