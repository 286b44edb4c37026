//! Fingerprint-gated recreation of a manifest.
//!
//! Some fields of a deployed resource are only read once, at creation. A
//! database's bootstrap admin password is the motivating case: changing it in
//! the manifest and re-applying has no effect on the running instance. The
//! gate records a fingerprint of those inputs as an annotation on the
//! namespace and, when the fingerprint changes, tells the caller to delete
//! the resource before applying it again.
//!
//! | stored annotation       | decision            |
//! |-------------------------|---------------------|
//! | namespace/key absent    | apply in place      |
//! | equal to new value      | apply in place      |
//! | different or unreadable | delete, then apply  |
//!
//! Only the fields handed to [`Fingerprint::compute`] are covered. Other
//! manifest changes never trigger recreation.

use std::fmt;

use crate::backend::{Backend, DeleteOptions};
use crate::error::{Error, Result};

/// Annotation key used for the PostgreSQL deployment.
pub const POSTGRES_FINGERPRINT_ANNOTATION: &str = "kaloupile.dev/postgresql-config-hash";

const HEX_LEN: usize = 64;

/// blake3 digest of a fixed list of labelled fields, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash `fields` in order. Each field is written as
    /// `label:byte_len:value\n`, so no value can be confused with a
    /// delimiter or spill into its neighbour.
    pub fn compute(fields: &[(&str, &str)]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (label, value) in fields {
            hasher.update(format!("{label}:{}:", value.len()).as_bytes());
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Parse a stored value. Anything that is not 64 lowercase hex digits
    /// is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let well_formed = value.len() == HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the namespace annotation said before this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Previous {
    /// Namespace or annotation missing: first apply
    Absent,
    /// Same fingerprint as now
    Matching,
    /// A different, well-formed fingerprint
    Changed(Fingerprint),
    /// Present but not a fingerprint (raw value or decode error)
    Unreadable(String),
}

/// Outcome of [`Gate::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Delete the existing objects before applying
    pub force_recreate: bool,
    /// Fingerprint to record after a successful apply
    pub fingerprint: Fingerprint,
    pub previous: Previous,
}

/// Options for [`Gate::rollout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutOptions {
    /// Honour `force_recreate`. When false the manifest is always applied in
    /// place, even if the fingerprint changed.
    pub recreate: bool,
}

impl Default for RolloutOptions {
    fn default() -> Self {
        Self { recreate: true }
    }
}

/// What [`Gate::rollout`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutOutcome {
    Applied,
    Recreated,
}

/// Compares and records a fingerprint annotation on one namespace.
pub struct Gate<'a> {
    backend: &'a dyn Backend,
    namespace: String,
    annotation: String,
}

impl<'a> Gate<'a> {
    pub fn new(backend: &'a dyn Backend, namespace: &str, annotation: &str) -> Self {
        Self {
            backend,
            namespace: namespace.to_string(),
            annotation: annotation.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Compare `fingerprint` with the stored annotation.
    ///
    /// A missing namespace counts as "never applied". Any other lookup
    /// failure is returned as-is.
    pub fn decide(&self, fingerprint: Fingerprint) -> Result<Decision> {
        let previous = match self.backend.namespace_annotations(&self.namespace) {
            Ok(annotations) => match annotations.get(&self.annotation) {
                None => Previous::Absent,
                Some(raw) => match Fingerprint::parse(raw) {
                    Some(stored) if stored == fingerprint => Previous::Matching,
                    Some(stored) => Previous::Changed(stored),
                    None => Previous::Unreadable(raw.clone()),
                },
            },
            Err(Error::NotFound(_)) => Previous::Absent,
            Err(Error::InvalidAnnotations { message, .. }) => Previous::Unreadable(message),
            Err(e) => return Err(e),
        };

        let force_recreate = matches!(previous, Previous::Changed(_) | Previous::Unreadable(_));
        log::debug!(
            "Gate {}/{}: previous={previous:?} force_recreate={force_recreate}",
            self.namespace,
            self.annotation
        );

        Ok(Decision {
            force_recreate,
            fingerprint,
            previous,
        })
    }

    /// Store `fingerprint` on the namespace. Must follow every successful
    /// apply, or the next run will recreate again.
    pub fn record(&self, fingerprint: &Fingerprint) -> Result<()> {
        self.backend
            .annotate_namespace(&self.namespace, &self.annotation, fingerprint.as_str())
    }

    /// Delete (if the decision demands it), apply, then record.
    pub fn rollout(
        &self,
        decision: &Decision,
        manifest: &[u8],
        options: RolloutOptions,
    ) -> Result<RolloutOutcome> {
        let recreate = decision.force_recreate && options.recreate;
        if recreate {
            log::info!(
                "Fingerprint changed; deleting existing resources in {}",
                self.namespace
            );
            self.backend
                .delete_manifest(manifest, DeleteOptions::default())?;
        } else if decision.force_recreate {
            log::warn!("Fingerprint changed but recreation is disabled; applying in place");
        }

        self.backend.apply_manifest(manifest)?;
        self.record(&decision.fingerprint)?;

        Ok(if recreate {
            RolloutOutcome::Recreated
        } else {
            RolloutOutcome::Applied
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Annotations;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Apply,
        Delete(DeleteOptions),
        Annotate(String, String),
    }

    #[derive(Default)]
    struct FakeCluster {
        namespaces: RefCell<BTreeMap<String, Annotations>>,
        calls: RefCell<Vec<Call>>,
        lookup_error: Option<String>,
        malformed: bool,
    }

    impl Backend for FakeCluster {
        fn namespace_annotations(&self, namespace: &str) -> Result<Annotations> {
            if let Some(stderr) = &self.lookup_error {
                return Err(Error::from_kubectl_output(
                    &format!("get namespace {namespace}"),
                    stderr,
                    Some(namespace),
                ));
            }
            if self.malformed {
                return Err(Error::InvalidAnnotations {
                    namespace: namespace.to_string(),
                    message: "expected value at line 1 column 1".into(),
                });
            }
            self.namespaces
                .borrow()
                .get(namespace)
                .cloned()
                .ok_or_else(|| Error::NotFound(namespace.to_string()))
        }

        fn annotate_namespace(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(Call::Annotate(key.to_string(), value.to_string()));
            self.namespaces
                .borrow_mut()
                .get_mut(namespace)
                .ok_or_else(|| Error::NotFound(namespace.to_string()))?
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn apply_manifest(&self, _manifest: &[u8]) -> Result<()> {
            self.calls.borrow_mut().push(Call::Apply);
            // the manifest owns the namespace
            self.namespaces
                .borrow_mut()
                .entry("external".to_string())
                .or_default();
            Ok(())
        }

        fn delete_manifest(&self, _manifest: &[u8], options: DeleteOptions) -> Result<()> {
            self.calls.borrow_mut().push(Call::Delete(options));
            Ok(())
        }
    }

    fn creds(password: &str) -> Fingerprint {
        Fingerprint::compute(&[
            ("user", "admin"),
            ("password", password),
            ("database", "postgres"),
        ])
    }

    fn gate(cluster: &FakeCluster) -> Gate<'_> {
        Gate::new(cluster, "external", POSTGRES_FINGERPRINT_ANNOTATION)
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(creds("p1"), creds("p1"));
        assert_eq!(creds("p1").as_str().len(), HEX_LEN);
    }

    #[test]
    fn test_fingerprint_near_miss() {
        assert_ne!(creds("p1"), creds("p2"));
        assert_ne!(creds("p1"), creds("p1 "));
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        let a = Fingerprint::compute(&[("user", "ad"), ("password", "min")]);
        let b = Fingerprint::compute(&[("user", "adm"), ("password", "in")]);
        assert_ne!(a, b);

        let c = Fingerprint::compute(&[("user", "a\npassword:1:b"), ("password", "")]);
        let d = Fingerprint::compute(&[("user", "a"), ("password", "b")]);
        assert_ne!(c, d);
    }

    #[test]
    fn test_fingerprint_parse() {
        let fp = creds("p1");
        assert_eq!(Fingerprint::parse(fp.as_str()), Some(fp.clone()));
        assert_eq!(Fingerprint::parse(&format!(" {fp}\n")), Some(fp));
        assert_eq!(Fingerprint::parse("not-a-hash"), None);
        assert_eq!(Fingerprint::parse(&"A".repeat(HEX_LEN)), None);
    }

    #[test]
    fn test_missing_namespace_applies_in_place() {
        let cluster = FakeCluster::default();
        let decision = gate(&cluster).decide(creds("p1")).unwrap();
        assert!(!decision.force_recreate);
        assert_eq!(decision.previous, Previous::Absent);
    }

    #[test]
    fn test_missing_annotation_applies_in_place() {
        let cluster = FakeCluster::default();
        cluster
            .namespaces
            .borrow_mut()
            .insert("external".into(), Annotations::new());
        let decision = gate(&cluster).decide(creds("p1")).unwrap();
        assert!(!decision.force_recreate);
    }

    #[test]
    fn test_decide_is_repeatable() {
        let cluster = FakeCluster::default();
        let g = gate(&cluster);
        g.rollout(
            &g.decide(creds("p1")).unwrap(),
            b"kind: Namespace",
            RolloutOptions::default(),
        )
        .unwrap();

        let first = g.decide(creds("p1")).unwrap();
        let second = g.decide(creds("p1")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.previous, Previous::Matching);
        assert!(!first.force_recreate);
    }

    #[test]
    fn test_password_change_forces_recreate() {
        let cluster = FakeCluster::default();
        let g = gate(&cluster);

        let first = g.decide(creds("p1")).unwrap();
        assert!(!first.force_recreate);
        assert_eq!(
            g.rollout(&first, b"manifest", RolloutOptions::default())
                .unwrap(),
            RolloutOutcome::Applied
        );

        let second = g.decide(creds("p2")).unwrap();
        assert!(second.force_recreate);
        assert_ne!(second.fingerprint, first.fingerprint);
        assert_eq!(second.previous, Previous::Changed(first.fingerprint.clone()));

        cluster.calls.borrow_mut().clear();
        assert_eq!(
            g.rollout(&second, b"manifest", RolloutOptions::default())
                .unwrap(),
            RolloutOutcome::Recreated
        );
        assert_eq!(
            *cluster.calls.borrow(),
            vec![
                Call::Delete(DeleteOptions {
                    wait: true,
                    ignore_not_found: true
                }),
                Call::Apply,
                Call::Annotate(
                    POSTGRES_FINGERPRINT_ANNOTATION.to_string(),
                    second.fingerprint.to_string()
                ),
            ]
        );

        // recorded, so the next run settles
        assert!(!g.decide(creds("p2")).unwrap().force_recreate);
    }

    #[test]
    fn test_recreate_disabled_applies_in_place() {
        let cluster = FakeCluster::default();
        let g = gate(&cluster);
        g.rollout(&g.decide(creds("p1")).unwrap(), b"m", RolloutOptions::default())
            .unwrap();
        cluster.calls.borrow_mut().clear();

        let decision = g.decide(creds("p2")).unwrap();
        let outcome = g
            .rollout(&decision, b"m", RolloutOptions { recreate: false })
            .unwrap();
        assert_eq!(outcome, RolloutOutcome::Applied);
        assert!(
            !cluster
                .calls
                .borrow()
                .iter()
                .any(|c| matches!(c, Call::Delete(_)))
        );
    }

    #[test]
    fn test_garbage_annotation_forces_recreate() {
        let cluster = FakeCluster::default();
        let mut annotations = Annotations::new();
        annotations.insert(POSTGRES_FINGERPRINT_ANNOTATION.into(), "garbage".into());
        cluster
            .namespaces
            .borrow_mut()
            .insert("external".into(), annotations);

        let decision = gate(&cluster).decide(creds("p1")).unwrap();
        assert!(decision.force_recreate);
        assert_eq!(decision.previous, Previous::Unreadable("garbage".into()));
    }

    #[test]
    fn test_malformed_annotation_map_forces_recreate() {
        let cluster = FakeCluster {
            malformed: true,
            ..FakeCluster::default()
        };
        let decision = gate(&cluster).decide(creds("p1")).unwrap();
        assert!(decision.force_recreate);
    }

    #[test]
    fn test_lookup_failure_is_not_absence() {
        let cluster = FakeCluster {
            lookup_error: Some("Unable to connect to the server: dial tcp: i/o timeout".into()),
            ..FakeCluster::default()
        };
        let err = gate(&cluster).decide(creds("p1")).unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_missing_kube_context_is_fatal() {
        let cluster = FakeCluster {
            lookup_error: Some(r#"error: context "kind-kaloupile" not found"#.into()),
            ..FakeCluster::default()
        };
        let err = gate(&cluster).decide(creds("p1")).unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("kind-kaloupile"));
    }
}
