//! `portico init`: write a starter TOML configuration.

use crate::cli::InitArgs;
use crate::error::GatewayError;

pub fn execute(args: &InitArgs) -> Result<(), GatewayError> {
    let output = &args.output;

    if output.exists() {
        return Err(GatewayError::FileExists {
            path: output.clone(),
        });
    }

    std::fs::write(output, STARTER)?;
    println!("Created {}", output.display());
    Ok(())
}

/// Every section with its defaults; only `[[services]]` is required.
pub const STARTER: &str = r#"# Portico gateway config
#
# Requests to /{service}/... are proxied to one healthy upstream of the
# service registered under that path. Commented values are defaults.

[server]
# host = "0.0.0.0"
# port = 8080
# admin_port = 9090

[proxy]
# timeout_ms = 5000           # wait this long for upstream response headers
# max_body = 1048576
# proxy_headers = true        # X-Forwarded-*, X-Real-IP, Via
# strip_hop_by_hop = true

[load_balancing]
# algorithm = "round_robin"   # or "random"

[health_check]
# enabled = true              # when false, upstreams are assumed healthy
# interval_secs = 5
# timeout_ms = 2000

[logging]
# file = "audit.log"          # audit log (JSON lines); disabled when unset
# max_writers = 100
# queue_capacity = 1024
# max_body_capture = 65536

# [jwt]
# secret_key = "change-me"

[[services]]
path = "/orders"
methods = ["GET", "POST"]
strip_path = true
upstreams = [
  { url = "http://localhost:8081" },
  { url = "http://localhost:8082" },
]

# [[services]]
# path = "/billing"
# algorithm = "random"
# jwt_required = true
# upstreams = [{ url = "http://localhost:8083" }]
"#;
