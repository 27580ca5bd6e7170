use std::process::ExitCode;

fn main() -> ExitCode {
    match shore_squad_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
