use std::process::ExitCode;

fn main() -> ExitCode {
    confly_cli::run()
}
