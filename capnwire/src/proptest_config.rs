use proptest::test_runner::Config;

/// Shared configuration for proptest tests.
///
/// The properties here are heavyweight per case: most of them build a whole
/// segment arena (or run pack/unpack over multi-hundred-word inputs) rather
/// than checking a pure function. Under Miri that cost balloons from
/// microseconds to seconds, so the case count drops to just enough to cross
/// the interesting branches (zero runs, raw runs, literal tags, segment
/// spill) and failure persistence is disabled since it writes regression
/// files to disk.
pub(crate) fn proptest_cfg() -> Config {
    let mut cfg = Config::default();
    if cfg!(miri) {
        cfg.cases = 8;
        cfg.failure_persistence = None;
    }
    cfg
}
