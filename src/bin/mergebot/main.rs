mod display;

use display::{display_plans, output_mutations};
use mergebot::{FileSource, evaluate, parse_args};

const DEFAULT_LOG_FILTER: &str = "warn";
const USAGE_EXIT_CODE: i32 = 2;

/// Help and version requests are successful runs; anything else clap
/// rejects is a usage error.
fn clap_exit_code(kind: clap::error::ErrorKind) -> i32 {
    use clap::error::ErrorKind;
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => USAGE_EXIT_CODE,
    }
}

fn exit_for_clap_error(clap_err: &clap::Error) -> ! {
    let code = clap_exit_code(clap_err.kind());
    if code == 0 {
        print!("{clap_err}");
    } else {
        eprint!("{clap_err}");
    }
    std::process::exit(code)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let (spec, display_mode) = match parse_args(std::env::args()) {
        Ok(result) => result,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                exit_for_clap_error(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let result = evaluate(&spec, &FileSource).await?;
    let mut stdout = std::io::stdout().lock();

    if spec.has_mutations() {
        output_mutations(&result.mutations, &mut stdout)?;
    } else {
        display_plans(&result.evaluations, display_mode, &mut stdout)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn clap_kind(args: &[&str]) -> ErrorKind {
        let err = parse_args(args.iter().copied()).unwrap_err();
        err.downcast_ref::<clap::Error>().map(|e| e.kind()).unwrap()
    }

    #[test]
    fn test_help_and_version_exit_successfully() {
        assert_eq!(clap_exit_code(clap_kind(&["mergebot", "--help"])), 0);
        assert_eq!(clap_exit_code(clap_kind(&["mergebot", "--version"])), 0);
    }

    #[test]
    fn test_usage_errors_exit_with_two() {
        assert_eq!(clap_exit_code(clap_kind(&["mergebot"])), USAGE_EXIT_CODE);
        assert_eq!(
            clap_exit_code(clap_kind(&["mergebot", "--no-such-flag", "a.json"])),
            USAGE_EXIT_CODE
        );
    }

    #[test]
    fn test_validation_errors_are_not_clap_errors() {
        let err = parse_args(["mergebot", "-", "-"]).unwrap_err();
        assert!(err.downcast_ref::<clap::Error>().is_none());
    }
}
