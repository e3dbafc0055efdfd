//! [`ServiceControl`] over `systemctl`.

use std::process::{Command, Stdio};

use crate::host::ServiceControl;

/// Shells out to `systemctl`. A call succeeds when systemctl exits zero.
#[derive(Debug, Clone)]
pub struct Systemctl {
    program: String,
}

impl Default for Systemctl {
    fn default() -> Self {
        Self {
            program: "systemctl".to_string(),
        }
    }
}

impl Systemctl {
    /// Use a different binary in place of `systemctl`.
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn call(&self, args: &[&str]) -> bool {
        let result = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();
        match result {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                tracing::debug!(
                    command = %args.join(" "),
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "systemctl returned nonzero"
                );
                false
            }
            Err(e) => {
                tracing::error!(program = %self.program, error = %e, "failed to run systemctl");
                false
            }
        }
    }

    fn transition(&self, verb: &str, unit: &str) -> bool {
        tracing::info!(unit, "{verb}");
        let ok = self.call(&[verb, unit]);
        if !ok {
            tracing::warn!(unit, "systemctl {verb} failed");
        }
        ok
    }
}

impl ServiceControl for Systemctl {
    fn start(&self, unit: &str) -> bool {
        self.transition("start", unit)
    }

    fn stop(&self, unit: &str) -> bool {
        self.transition("stop", unit)
    }

    fn restart(&self, unit: &str) -> bool {
        self.transition("restart", unit)
    }

    fn is_running(&self, unit: &str) -> bool {
        self.call(&["--quiet", "is-active", unit])
    }

    fn enable(&self, unit: &str) -> bool {
        self.transition("enable", unit)
    }

    fn daemon_reload(&self) -> bool {
        self.call(&["daemon-reload"])
    }
}
