mod cli;

use marrow::ModError;
use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<ModError>()
                .map(|mod_err| mod_err.category().exit_code())
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}
