use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let timer = LocalTime::new(time::macros::format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_target(false)
        .init();
}

/// Sizes the global rayon pool; defaults to the CPU count capped at 8.
pub fn configure_workers(workers: Option<usize>) -> anyhow::Result<usize> {
    let workers = workers.unwrap_or_else(|| std::cmp::min(num_cpus::get(), 8));
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()?;
    Ok(workers)
}

pub fn format_number(num: usize) -> String {
    let digits = num.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Masks every label but the TLD; short second-level labels collapse to `???`.
pub fn redact_domain(domain: &str) -> String {
    let Some((labels, tld)) = domain.rsplit_once('.') else {
        return domain.to_string();
    };

    let second_level = labels.rsplit('.').next().unwrap_or(labels);
    if second_level.chars().count() <= 3 {
        return format!("???.{tld}");
    }

    let masked = labels
        .split('.')
        .map(|label| "*".repeat(label.chars().count()))
        .collect::<Vec<_>>()
        .join(".");
    format!("{masked}.{tld}")
}

pub fn validate_args(args: &crate::args::Args) -> anyhow::Result<()> {
    if let Some(workers) = args.workers {
        if workers == 0 {
            anyhow::bail!("--workers must be greater than 0");
        }
    }

    if args.in_memory && !matches!(args.command, crate::args::Command::Serve { .. }) {
        anyhow::bail!("--in-memory only makes sense with the serve command");
    }

    Ok(())
}
