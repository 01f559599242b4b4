//! Startup banner

use super::config::{AppConfig, is_all_interfaces};
use super::constants::APP_NAME;

// Label column width
const W: usize = 10;

fn line(color: &str, label: &str, value: &str) {
    println!("  \x1b[{color}m➜\x1b[0m  \x1b[1m{label:<W$}\x1b[0m {value}");
}

/// Print the startup banner with the API, docs and network URLs
pub fn print_banner(config: &AppConfig, data_dir: &str) {
    let host = config.server.host.as_str();
    let port = config.server.port;
    let display_host = if is_all_interfaces(host) {
        "localhost"
    } else {
        host
    };

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    line("32", "API:", &format!("http://{display_host}:{port}/api/v1"));
    line("33", "Docs:", &format!("http://{display_host}:{port}/api/docs"));

    if host == "127.0.0.1" || host == "localhost" {
        println!("  \x1b[90m➜  {:<W$} use --host 0.0.0.0 to expose\x1b[0m", "Network:");
    } else if is_all_interfaces(host) {
        if let Ok(interfaces) = local_ip_address::list_afinet_netifas() {
            for (_, ip) in interfaces
                .iter()
                .filter(|(_, ip)| ip.is_ipv4() && !ip.is_loopback())
            {
                line("32", "Network:", &format!("http://{ip}:{port}/api/v1"));
            }
        }
    } else {
        line("32", "Network:", &format!("http://{host}:{port}/api/v1"));
    }

    let sweep = if config.sweep.enabled {
        format!("every {}h", config.sweep.interval_hours)
    } else {
        "disabled".to_string()
    };
    println!("  \x1b[90m➜  {:<W$} {}\x1b[0m", "Sweep:", sweep);
    println!("  \x1b[90m➜  {:<W$} {}\x1b[0m", "Data:", data_dir);
    println!();
}
