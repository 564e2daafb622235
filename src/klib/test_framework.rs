//! Framework de testes do kernel
//!
//! Self-tests executados no boot (feature `self_test`). Cada subsistema
//! registra uma suite; falha em qualquer caso é reportada e contada, e o
//! chamador decide se o boot continua.

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }
}

/// Executa uma suite. Retorna (passed, failed, skipped).
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    crate::kinfo!("=== Executando suite: {}", name);

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        match (test.func)() {
            TestResult::Passed => {
                crate::kinfo!("[PASS] {}", test.name);
                passed += 1;
            }
            TestResult::Failed => {
                crate::kerror!("[FAIL] {}", test.name);
                failed += 1;
            }
            TestResult::Skipped => {
                crate::kwarn!("[SKIP] {}", test.name);
                skipped += 1;
            }
        }
    }

    crate::kinfo!(
        "=== Suite {}: {} passed, {} failed, {} skipped",
        name,
        passed,
        failed,
        skipped
    );
    (passed, failed, skipped)
}
