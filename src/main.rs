use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;

use log::{debug, error};
use tokio::net::TcpStream;
use tokio::runtime::Builder;

use kdpassd::client;
use kdpassd::config;
use kdpassd::tcp_server::start_tcp_server;
use kdpassd::util::Timeouts;

const DEFAULT_CONFIG_PATH: &str = "kdpassd.yaml";

fn print_usage_and_exit(arg0: String) {
    eprintln!("Usage: {arg0} [--threads/-t N] [--dry-run/-d] [config filename]");
    eprintln!("       {arg0} send [--plain] <host:port> <message>");
    std::process::exit(1);
}

async fn run_server(config_path: &Path, dry_run: bool) -> Result<(), String> {
    let config = config::load_config(config_path)
        .await
        .map_err(|e| format!("Failed to load config: {e}"))?;
    debug!(
        "Loaded config: bind_address={}, transport={:?}, exchange={:?}, handler={:?}",
        config.bind_address, config.transport, config.exchange, config.handler
    );

    let worker = config::create_worker(&config)
        .await
        .map_err(|e| format!("Failed to set up server: {e}"))?;

    if dry_run {
        println!("Config is valid, exiting.");
        return Ok(());
    }

    let (local_addr, join_handle) = start_tcp_server(config.bind_address, worker)
        .await
        .map_err(|e| format!("Failed to start server: {e}"))?;
    println!("Listening on {local_addr}");

    join_handle
        .await
        .map_err(|e| format!("Server task failed: {e}"))
}

async fn run_send(address: &str, message: &str, plain: bool) -> Result<(), String> {
    let address: SocketAddr = address
        .parse()
        .map_err(|e| format!("Invalid address {address}: {e}"))?;
    let stream = TcpStream::connect(address)
        .await
        .map_err(|e| format!("Could not connect to {address}: {e}"))?;
    stream
        .set_nodelay(true)
        .map_err(|e| format!("Failed to set TCP nodelay: {e}"))?;

    let reply = if plain {
        let mut stream = stream;
        client::exchange_plain(&mut stream, message.as_bytes(), Timeouts::default())
            .await
            .map_err(|e| format!("Exchange failed: {e}"))?
    } else {
        let mut session = client::connect(stream, Timeouts::default())
            .await
            .map_err(|e| format!("Handshake failed: {e}"))?;
        session
            .exchange(message.as_bytes())
            .await
            .map_err(|e| format!("Exchange failed: {e}"))?
    };

    println!("{}", String::from_utf8_lossy(&reply));
    Ok(())
}

fn main() {
    env_logger::builder()
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            let level_style = buf.default_level_style(record.level());
            let sanitized_args = format!("{}", record.args())
                .chars()
                .map(|c| {
                    if c.is_ascii_graphic() || c == ' ' {
                        c
                    } else {
                        '?'
                    }
                })
                .collect::<String>();

            writeln!(
                buf,
                "[{} {level_style}{}{level_style:#} {}] {}",
                timestamp,
                record.level(),
                record.target(),
                sanitized_args
            )
        })
        .init();

    let mut args: Vec<String> = std::env::args().collect();
    let arg0 = args.remove(0);
    let mut num_threads = 0usize;
    let mut dry_run = false;

    while !args.is_empty() && args[0].starts_with("-") {
        if args[0] == "--threads" || args[0] == "-t" {
            args.remove(0);
            if args.is_empty() {
                eprintln!("Missing threads argument.");
                print_usage_and_exit(arg0);
                return;
            }
            num_threads = match args.remove(0).parse::<usize>() {
                Ok(n) => n,
                Err(e) => {
                    eprintln!("Invalid thread count: {e}");
                    print_usage_and_exit(arg0);
                    return;
                }
            };
        } else if args[0] == "--dry-run" || args[0] == "-d" {
            args.remove(0);
            dry_run = true;
        } else {
            eprintln!("Invalid argument: {}", args[0]);
            print_usage_and_exit(arg0);
            return;
        }
    }

    let send_args = if args.first().map(String::as_str) == Some("send") {
        args.remove(0);
        let plain = args.first().map(String::as_str) == Some("--plain");
        if plain {
            args.remove(0);
        }
        if args.len() != 2 {
            print_usage_and_exit(arg0);
            return;
        }
        Some((args.remove(0), args.remove(0), plain))
    } else {
        None
    };

    if send_args.is_none() && args.len() > 1 {
        eprintln!("Only one config file is supported.");
        print_usage_and_exit(arg0);
        return;
    }

    if dry_run {
        println!("Starting dry run.");
    }

    if num_threads == 0 {
        num_threads = std::cmp::max(
            2,
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        );
        debug!("Runtime threads: {num_threads}");
    } else {
        println!("Using custom thread count ({num_threads})");
    }

    let mut builder = if num_threads == 1 {
        Builder::new_current_thread()
    } else {
        let mut mt = Builder::new_multi_thread();
        mt.worker_threads(num_threads);
        mt
    };

    let runtime = match builder.enable_io().enable_time().build() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Could not build tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async move {
        match send_args {
            Some((address, message, plain)) => run_send(&address, &message, plain).await,
            None => {
                let config_path = match args.pop() {
                    Some(path) => path,
                    None => {
                        println!(
                            "No config specified, assuming loading from file {DEFAULT_CONFIG_PATH}"
                        );
                        DEFAULT_CONFIG_PATH.to_string()
                    }
                };
                run_server(Path::new(&config_path), dry_run).await
            }
        }
    });

    if let Err(e) = result {
        error!("{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}
