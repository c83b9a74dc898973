//! CLI integration tests. Each file covers one command area; every test
//! runs the binary against its own temp vault directory via `ENVAULT_DIR`.

mod audit_test;
mod cli_test;
mod export_test;
mod import_test;
mod rotate_test;
mod vault_test;
