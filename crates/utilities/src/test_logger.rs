/// Initialises a logger for tests that do not use the `test_log::test` attribute,
/// for example integration tests that want to see the trace output.
///
/// Calling this multiple times is fine, only the first call installs the logger.
pub fn test_logger() -> Result<(), log::SetLoggerError> {
    env_logger::builder().is_test(true).try_init()
}
