use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process;
use std::sync::Arc;

use getopts::Options;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use dns_observer::observer::{
    DnsObserver, ManualClock, ObserverConfig, ObserverError, PrivacyLevel, ReplayLine,
    WildcardList,
};

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

/// Replays a JSON-lines resolver event capture and prints the resulting summary
fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt("c", "config", "Observer configuration file", "TOML");
    opts.optopt(
        "i",
        "input",
        "Event capture to replay, one JSON event per line (default: stdin)",
        "FILE",
    );
    opts.optopt(
        "p",
        "privacy",
        "Privacy level: show_all, hide_domains, hide_domains_clients, maximum",
        "LEVEL",
    );
    opts.optopt(
        "w",
        "wildcards",
        "dnsmasq configuration holding address=/domain/ wildcard rules",
        "FILE",
    );
    opts.optopt("t", "top", "Entries per top list in the summary", "N");
    opts.optflag("", "prometheus", "Print Prometheus metrics instead of JSON");
    opts.optflag("v", "verbose", "Log every event at debug level");

    let opt_matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{}", f);
            print_usage(&program, opts);
            process::exit(2);
        }
    };

    if opt_matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }

    let level = if opt_matches.opt_present("v") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let mut config = match opt_matches.opt_str("c") {
        Some(path) => match ObserverConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config {}: {}", path, e);
                process::exit(1);
            }
        },
        None => ObserverConfig::default(),
    };

    if let Some(level) = opt_matches.opt_str("p") {
        match level.parse::<PrivacyLevel>() {
            Ok(level) => config.privacy_level = level,
            Err(e) => {
                log::error!("{}", e);
                process::exit(2);
            }
        }
    }

    let top = match opt_matches.opt_str("t").map(|n| n.parse::<usize>()) {
        Some(Ok(n)) => n,
        Some(Err(e)) => {
            log::error!("Invalid --top value: {}", e);
            process::exit(2);
        }
        None => 10,
    };

    let clock = Arc::new(ManualClock::new(chrono::Utc::now().timestamp()));
    let mut observer = DnsObserver::new(config).with_clock(clock.clone());
    if let Some(path) = opt_matches.opt_str("w") {
        observer = observer.with_wildcards(Arc::new(WildcardList::from_file(path)));
    }

    let reader: Box<dyn BufRead> = match opt_matches.opt_str("i") {
        Some(path) => match File::open(&path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                log::error!("Failed to open {}: {}", path, e);
                process::exit(1);
            }
        },
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut applied = 0u64;
    for (lineno, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read input: {}", e);
                process::exit(1);
            }
        };
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let replay: ReplayLine = match serde_json::from_str(&line) {
            Ok(replay) => replay,
            Err(e) => {
                log::warn!("Skipping line {}: {}", lineno + 1, e);
                continue;
            }
        };

        if let Some(at) = replay.at {
            clock.set(at);
        }

        match observer.dispatch(&replay.event) {
            Ok(()) => applied += 1,
            Err(ObserverError::Resource(e)) => {
                log::error!("{} at line {}, stopping", e, lineno + 1);
                process::exit(1);
            }
            Err(e) => log::warn!("Line {}: {}", lineno + 1, e),
        }
    }

    log::info!("Replayed {} events", applied);

    if opt_matches.opt_present("prometheus") {
        match observer.prometheus_text() {
            Ok(text) => print!("{}", text),
            Err(e) => {
                log::error!("Failed to render metrics: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    match serde_json::to_string_pretty(&observer.summary(top)) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Failed to serialize summary: {}", e);
            process::exit(1);
        }
    }
}
