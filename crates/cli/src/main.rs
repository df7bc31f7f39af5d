use std::process::ExitCode;

fn main() -> ExitCode {
    deplo_cli::run()
}
