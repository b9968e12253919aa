use std::io::{self, Write};
use std::str::FromStr;

use clap::{load_yaml, App, ArgMatches};
use log::{error, LevelFilter};

use khll::cmd::{build, load_sketch, merge_sketches, report, BuildParameters};
use khll::errors::{KhllError, KhllErrorCode};
use khll::Error;

fn parse_arg<T: FromStr>(cmd: &ArgMatches, name: &str) -> Result<Option<T>, Error> {
    match cmd.value_of(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| KhllError::InvalidParameter {
                message: format!("cannot parse {} from '{}'", name, value),
            }),
        None => Ok(None),
    }
}

fn build_parameters(cmd: &ArgMatches) -> Result<BuildParameters, Error> {
    let ksize = parse_arg(cmd, "ksize")?.ok_or_else(|| KhllError::InvalidParameter {
        message: "k is required".into(),
    })?;

    let mut params = BuildParameters::new(ksize);
    // the default -b only applies to new sketches
    if cmd.occurrences_of("precision") > 0 {
        params.precision = parse_arg(cmd, "precision")?;
    }
    params.error_rate = parse_arg(cmd, "error_rate")?;
    params.input = cmd.value_of("input").map(Into::into);
    params.sketch = cmd.value_of("sketch").map(Into::into);
    params.passthrough = cmd.is_present("passthrough");

    Ok(params)
}

fn run(m: &ArgMatches) -> Result<(), Error> {
    match m.subcommand() {
        ("build", Some(cmd)) => {
            let params = build_parameters(cmd)?;

            if params.passthrough {
                let stdout = io::stdout();
                let mut out = io::BufWriter::new(stdout.lock());
                let hll = build(&params, &mut out)?;
                eprintln!("{}", report(&hll, false));
            } else {
                let hll = build(&params, &mut io::sink())?;
                println!("{}", report(&hll, false));
            }
        }
        ("estimate", Some(cmd)) => {
            let hll = load_sketch(cmd.value_of("sketch").unwrap_or_default())?;
            println!("{}", report(&hll, cmd.is_present("total")));
        }
        ("merge", Some(cmd)) => {
            let lists = cmd
                .values_of("input")
                .map(|vals| vals.collect::<Vec<_>>())
                .unwrap_or_default();
            let sketches = cmd
                .values_of("sketches")
                .map(|vals| vals.collect::<Vec<_>>())
                .unwrap_or_default();

            let hll = merge_sketches(lists, sketches, cmd.value_of("output"))?;
            println!("{}", report(&hll, cmd.is_present("total")));
        }
        _ => {}
    }

    io::stdout().flush()?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let yml = load_yaml!("khll.yml");
    let m = App::from_yaml(yml).get_matches();

    let quiet = m.is_present("quiet")
        || m
            .subcommand()
            .1
            .map_or(false, |cmd| cmd.is_present("quiet"));
    if quiet {
        log::set_max_level(LevelFilter::Warn);
    }

    if let Err(e) = run(&m) {
        error!("{} (error code {})", e, KhllErrorCode::from_error(&e) as u32);
        std::process::exit(1);
    }
}
