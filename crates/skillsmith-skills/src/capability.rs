//! Discovery and registration of the executable functions a skill ships in `scripts/`.
//!
//! A skill declares its functions in `scripts/tools.json` (or `scripts/tools.toml`):
//!
//! ```json
//! {
//!   "symbols": [
//!     { "name": "check_sop", "module": "sop_tools", "description": "...",
//!       "command": ["python3", "check_sop.py"] },
//!     { "name": "Report", "kind": "class", "module": "sop_tools" }
//!   ]
//! }
//! ```
//!
//! Only top-level functions that are not private and do not originate from an excluded
//! library module are registered.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::io::AsyncWriteExt as _;

use crate::manifest::SkillMetadata;

pub const SCRIPTS_DIR: &str = "scripts";
pub const MANIFEST_NAMES: &[&str] = &["tools.json", "tools.toml"];

/// Library and reflection modules whose symbols are never exposed as skill functions.
pub const EXCLUDED_MODULES: &[&str] = &[
    "builtins",
    "inspect",
    "importlib",
    "importlib.util",
    "pathlib",
    "typing",
    "io",
    "zipfile",
];

pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("invalid capability manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("function {name} is already registered by skill {owner}")]
    DuplicateFunction { name: String, owner: String },

    #[error("function {name} declares no command")]
    NotCallable { name: String },

    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("function {name} failed: {message}")]
    Invocation { name: String, message: String },

    #[error("function {name} timed out after {secs}s")]
    Timeout { name: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something the agent can invoke with JSON arguments and get text back.
pub trait Callable: Send + Sync + fmt::Debug {
    fn call(&self, args: serde_json::Value) -> BoxFuture<'_, Result<String, CapabilityError>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    #[default]
    Function,
    Class,
    Type,
    Constant,
}

/// A top-level symbol found in a skill's capability manifest.
#[derive(Debug, Clone)]
pub struct DiscoveredSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Module the symbol was declared in or re-exported from.
    pub origin: Option<String>,
    pub description: String,
    pub callable: Option<Arc<dyn Callable>>,
}

/// Enumerates the symbols a skill directory exposes.
pub trait CapabilityProvider: Send + Sync {
    /// An absent manifest is not an error and yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Manifest`] when a manifest exists but cannot be parsed.
    fn discover(
        &self,
        skill_dir: &Path,
        skill_name: &str,
    ) -> Result<Vec<DiscoveredSymbol>, CapabilityError>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    symbols: Vec<SymbolSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SymbolSpec {
    name: String,
    #[serde(default)]
    kind: SymbolKind,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    command: Vec<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Reads `scripts/tools.json` or `scripts/tools.toml` and backs each function with a
/// [`ScriptCallable`].
#[derive(Debug, Clone)]
pub struct ManifestCapabilityProvider {
    default_timeout: Duration,
}

impl Default for ManifestCapabilityProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SCRIPT_TIMEOUT)
    }
}

impl ManifestCapabilityProvider {
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    fn parse(path: &Path) -> Result<ManifestFile, CapabilityError> {
        let content = std::fs::read_to_string(path)?;
        let parsed = if path.extension().is_some_and(|e| e == "toml") {
            toml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| CapabilityError::Manifest {
            path: path.to_path_buf(),
            message,
        })
    }
}

impl CapabilityProvider for ManifestCapabilityProvider {
    fn discover(
        &self,
        skill_dir: &Path,
        skill_name: &str,
    ) -> Result<Vec<DiscoveredSymbol>, CapabilityError> {
        let scripts_dir = skill_dir.join(SCRIPTS_DIR);
        let Some(path) = MANIFEST_NAMES
            .iter()
            .map(|name| scripts_dir.join(name))
            .find(|p| p.is_file())
        else {
            return Ok(Vec::new());
        };

        let manifest = Self::parse(&path)?;
        tracing::debug!(
            skill = skill_name,
            path = %path.display(),
            symbols = manifest.symbols.len(),
            "read capability manifest"
        );

        Ok(manifest
            .symbols
            .into_iter()
            .map(|spec| {
                let callable = match spec.command.split_first() {
                    Some((program, args)) if spec.kind == SymbolKind::Function => {
                        Some(Arc::new(ScriptCallable {
                            name: spec.name.clone(),
                            program: program.clone(),
                            args: args.to_vec(),
                            working_dir: scripts_dir.clone(),
                            timeout: spec
                                .timeout_secs
                                .map_or(self.default_timeout, Duration::from_secs),
                        }) as Arc<dyn Callable>)
                    }
                    _ => None,
                };
                DiscoveredSymbol {
                    name: spec.name,
                    kind: spec.kind,
                    origin: spec.module,
                    description: spec.description,
                    callable,
                }
            })
            .collect())
    }
}

/// Runs a command inside the skill's `scripts/` directory, writing the JSON arguments to
/// stdin and returning trimmed stdout.
#[derive(Debug, Clone)]
pub struct ScriptCallable {
    name: String,
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ScriptCallable {
    async fn run(&self, input: serde_json::Value) -> Result<String, CapabilityError> {
        use std::process::Stdio;

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&input).map_err(|e| CapabilityError::Invocation {
                name: self.name.clone(),
                message: e.to_string(),
            })?;
            // A script that ignores stdin may exit before reading it.
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!(function = %self.name, "stdin closed early: {e}");
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CapabilityError::Timeout {
                name: self.name.clone(),
                secs: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CapabilityError::Invocation {
                name: self.name.clone(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

impl Callable for ScriptCallable {
    fn call(&self, args: serde_json::Value) -> BoxFuture<'_, Result<String, CapabilityError>> {
        self.run(args).boxed()
    }
}

/// A function registered on behalf of a skill.
#[derive(Debug, Clone)]
pub struct CapabilityFunction {
    pub name: String,
    pub skill_name: String,
    pub description: String,
    pub callable: Arc<dyn Callable>,
}

/// Destination for discovered functions, normally the agent's tool surface.
pub trait FunctionRegistry: Send + Sync {
    /// # Errors
    ///
    /// Implementation-defined; the loader logs and skips failed registrations.
    fn register(&self, function: CapabilityFunction) -> Result<(), CapabilityError>;
}

/// In-memory [`FunctionRegistry`]. Names are global: a skill may re-register its own
/// functions, but cannot take a name owned by another skill.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    functions: RwLock<BTreeMap<String, CapabilityFunction>>,
}

impl CapabilityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<CapabilityFunction> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered function names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke a registered function.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::UnknownFunction`] or whatever the callable returns.
    pub async fn invoke(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<String, CapabilityError> {
        let function = self.get(name).ok_or_else(|| CapabilityError::UnknownFunction {
            name: name.to_owned(),
        })?;
        tracing::info!(function = name, skill = %function.skill_name, "invoking skill function");
        function.callable.call(args).await
    }
}

impl FunctionRegistry for CapabilityRegistry {
    fn register(&self, function: CapabilityFunction) -> Result<(), CapabilityError> {
        let mut functions = self
            .functions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = functions.get(&function.name)
            && existing.skill_name != function.skill_name
        {
            return Err(CapabilityError::DuplicateFunction {
                name: function.name,
                owner: existing.skill_name.clone(),
            });
        }
        functions.insert(function.name.clone(), function);
        Ok(())
    }
}

/// Outcome of one discovery pass. Partial success is a normal result.
#[derive(Debug, Default)]
pub struct RegistrationReport {
    pub registered: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<(String, CapabilityError)>,
}

impl RegistrationReport {
    #[must_use]
    pub fn count(&self) -> usize {
        self.registered.len()
    }
}

/// Why a discovered symbol is not offered to the agent, if it is not.
fn exclusion_reason(symbol: &DiscoveredSymbol) -> Option<&'static str> {
    if symbol.name.starts_with('_') {
        return Some("private name");
    }
    if symbol.kind != SymbolKind::Function {
        return Some("not a function");
    }
    if let Some(origin) = symbol.origin.as_deref()
        && (origin.starts_with('_') || EXCLUDED_MODULES.contains(&origin))
    {
        return Some("library module");
    }
    None
}

pub struct CapabilityLoader {
    provider: Box<dyn CapabilityProvider>,
}

impl fmt::Debug for CapabilityLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityLoader").finish_non_exhaustive()
    }
}

impl Default for CapabilityLoader {
    fn default() -> Self {
        Self::new(Box::new(ManifestCapabilityProvider::default()))
    }
}

impl CapabilityLoader {
    #[must_use]
    pub fn new(provider: Box<dyn CapabilityProvider>) -> Self {
        Self { provider }
    }

    /// Discover the skill's functions and register each survivor with `registry`.
    ///
    /// Never fails: an unreadable manifest and individual registration errors are logged
    /// and collected in the report while the remaining functions are still registered.
    pub fn discover_and_register(
        &self,
        skill: &SkillMetadata,
        registry: &dyn FunctionRegistry,
    ) -> RegistrationReport {
        let mut report = RegistrationReport::default();

        let symbols = match self.provider.discover(&skill.source_path, &skill.name) {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::warn!(skill = %skill.name, "capability discovery failed: {e}");
                report.failures.push((skill.name.clone(), e));
                return report;
            }
        };

        for symbol in symbols {
            if let Some(reason) = exclusion_reason(&symbol) {
                tracing::debug!(skill = %skill.name, symbol = %symbol.name, reason, "skipping symbol");
                report.skipped.push(symbol.name);
                continue;
            }

            let Some(callable) = symbol.callable else {
                let err = CapabilityError::NotCallable {
                    name: symbol.name.clone(),
                };
                tracing::warn!(skill = %skill.name, function = %symbol.name, "{err}");
                report.failures.push((symbol.name, err));
                continue;
            };

            let function = CapabilityFunction {
                name: symbol.name.clone(),
                skill_name: skill.name.clone(),
                description: symbol.description,
                callable,
            };
            match registry.register(function) {
                Ok(()) => report.registered.push(symbol.name),
                Err(e) => {
                    tracing::warn!(
                        skill = %skill.name,
                        function = %symbol.name,
                        "function registration failed: {e}"
                    );
                    report.failures.push((symbol.name, e));
                }
            }
        }

        if !report.registered.is_empty() {
            tracing::info!(
                skill = %skill.name,
                count = report.registered.len(),
                "registered skill functions"
            );
        }
        report
    }
}
