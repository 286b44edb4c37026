//! Backend that shells out to `kubectl`.

use std::io::{self, Write};
use std::process::{Command, Stdio};

use crate::backend::{Annotations, Backend, DeleteOptions};
use crate::error::{Error, Result};

/// Runs `kubectl` against the current kube context.
pub struct KubectlBackend {
    kubectl_path: String,
    /// Arguments placed before every command
    leading_args: Vec<String>,
}

impl KubectlBackend {
    /// Create a backend, failing if kubectl is not installed.
    pub fn new() -> Result<Self> {
        let kubectl_path = find_kubectl()?;
        Ok(Self::with_path(&kubectl_path))
    }

    /// Use an explicit kubectl binary.
    pub fn with_path(path: &str) -> Self {
        Self {
            kubectl_path: path.to_string(),
            leading_args: Vec::new(),
        }
    }

    /// Run kubectl, optionally feeding `stdin`, and return stdout.
    ///
    /// The child is always waited on. If kubectl exits before reading all of
    /// `stdin`, the failure is reported from its own output rather than as a
    /// broken pipe.
    fn run(&self, args: &[&str], stdin: Option<&[u8]>, namespace: Option<&str>) -> Result<String> {
        let command = args.join(" ");
        log::debug!("Running kubectl {command}");

        let mut child = Command::new(&self.kubectl_path)
            .args(&self.leading_args)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    Error::KubectlNotFound
                } else {
                    Error::Io(e)
                }
            })?;

        let written = match (stdin, child.stdin.take()) {
            // pipe is dropped at the end of the arm, closing kubectl's stdin
            (Some(input), Some(mut pipe)) => pipe.write_all(input),
            _ => Ok(()),
        };
        if let Err(e) = &written {
            log::debug!("Writing kubectl stdin failed: {e}");
        }

        let output = child.wait_with_output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let detail = if stderr.trim().is_empty() { &stdout } else { &stderr };
            return Err(Error::from_kubectl_output(&command, detail, namespace));
        }
        // exited cleanly without the whole manifest
        written?;

        Ok(stdout)
    }

    /// Run a mutating command and forward its output to the log.
    fn run_logged(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<()> {
        let stdout = self.run(args, stdin, None)?;
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            log::info!("[kubectl] {line}");
        }
        Ok(())
    }
}

impl Backend for KubectlBackend {
    fn namespace_annotations(&self, namespace: &str) -> Result<Annotations> {
        let output = self.run(
            &[
                "get",
                "namespace",
                namespace,
                "-o",
                "jsonpath={.metadata.annotations}",
            ],
            None,
            Some(namespace),
        )?;
        parse_annotations(namespace, &output)
    }

    fn annotate_namespace(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let annotation = format!("{key}={value}");
        self.run_logged(
            &["annotate", "namespace", namespace, &annotation, "--overwrite"],
            None,
        )
    }

    fn apply_manifest(&self, manifest: &[u8]) -> Result<()> {
        self.run_logged(&["apply", "-f", "-"], Some(manifest))
    }

    fn delete_manifest(&self, manifest: &[u8], options: DeleteOptions) -> Result<()> {
        let wait = format!("--wait={}", options.wait);
        let mut args = vec!["delete", "-f", "-", wait.as_str()];
        if options.ignore_not_found {
            args.push("--ignore-not-found");
        }
        self.run_logged(&args, Some(manifest))
    }
}

/// Decode the jsonpath output for `.metadata.annotations`.
///
/// kubectl prints nothing at all when a namespace has no annotations.
fn parse_annotations(namespace: &str, output: &str) -> Result<Annotations> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Annotations::new());
    }
    serde_json::from_str(trimmed).map_err(|e| Error::InvalidAnnotations {
        namespace: namespace.to_string(),
        message: e.to_string(),
    })
}

/// Locate kubectl on PATH.
fn find_kubectl() -> Result<String> {
    let output = Command::new("which")
        .arg("kubectl")
        .output()
        .map_err(|_| Error::KubectlNotFound)?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Ok(path);
        }
    }
    Err(Error::KubectlNotFound)
}
