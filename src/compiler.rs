//! Compilation orchestrator: resolves imports, links files in dependency
//! order and runs the requested backends over the root files.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use crate::codegen::{proto::ProtoBackend, rust::RustBackend, Backend, OutputSink};
use crate::error::{CompileError, LinkError, Result};
use crate::linker::{DefaultLinker, SchemaLinker};
use crate::parser;
use crate::parser::ast::FileDescriptor;
use crate::parser::location::SourceLocationTable;
use crate::resolver::ImportResolver;
use crate::types::LinkedFile;
use crate::well_known::{self, WellKnownSchemas};

/// A backend name plus its optional parameter, written `name[:parameter]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub name: String,
    pub parameter: String,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Target {
            name: name.into(),
            parameter: String::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = parameter.into();
        self
    }
}

impl FromStr for Target {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, parameter) = s.split_once(':').unwrap_or((s, ""));
        if name.is_empty() {
            return Err(CompileError::UnknownTarget(s.to_string()));
        }
        Ok(Target::new(name).with_parameter(parameter))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameter.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.name, self.parameter)
        }
    }
}

/// A configured compiler. Cheap to share between threads; every call to
/// [`compile`](Compiler::compile) works on its own resolution state.
pub struct Compiler {
    linker: Box<dyn SchemaLinker>,
    backends: BTreeMap<String, Box<dyn Backend>>,
    record_source_locations: bool,
    // Built on first import of a well-known file, then reused by later calls.
    well_known: OnceLock<WellKnownSchemas>,
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .field("record_source_locations", &self.record_source_locations)
            .field("well_known_built", &self.well_known.get().is_some())
            .finish()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Default linker and the built-in backends.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> CompilerBuilder {
        CompilerBuilder::default()
    }

    pub fn backend_names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    /// Compile `roots` (logical path to source text) for every target.
    ///
    /// Imports are looked up in `roots` first, then through `resolver`, then
    /// among the well-known files. Only the root files reach the backends.
    /// The result maps output paths to generated text; on error nothing is
    /// returned.
    #[tracing::instrument(skip_all, fields(roots = roots.len(), targets = targets.len()))]
    pub fn compile(
        &self,
        roots: &BTreeMap<String, String>,
        targets: &[Target],
        resolver: Option<&dyn ImportResolver>,
    ) -> Result<BTreeMap<String, String>> {
        let backends = targets
            .iter()
            .map(|target| {
                self.backends
                    .get(&target.name)
                    .map(|backend| (backend.as_ref(), target.parameter.as_str()))
                    .ok_or_else(|| CompileError::UnknownTarget(target.name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let linked = self.link(roots, resolver)?;

        let mut sink = OutputSink::new();
        for file in linked.values() {
            for (backend, parameter) in &backends {
                backend.emit(file, parameter, &mut sink)?;
            }
        }
        tracing::debug!(outputs = sink.len(), "compile finished");
        Ok(sink.into_map())
    }

    /// Resolve and link `roots` without generating code.
    pub fn link(
        &self,
        roots: &BTreeMap<String, String>,
        resolver: Option<&dyn ImportResolver>,
    ) -> Result<BTreeMap<String, Arc<LinkedFile>>> {
        let mut resolution = Resolution {
            compiler: self,
            roots,
            resolver,
            cache: HashMap::new(),
            in_flight: HashSet::new(),
        };
        for path in roots.keys() {
            resolution.resolve(path)?;
        }
        Ok(roots
            .keys()
            .filter_map(|path| resolution.cache.get(path).map(|file| (path.clone(), file.clone())))
            .collect())
    }

    fn well_known(&self) -> Result<&WellKnownSchemas> {
        if let Some(schemas) = self.well_known.get() {
            return Ok(schemas);
        }
        let built = WellKnownSchemas::build(self.linker.as_ref())?;
        Ok(self.well_known.get_or_init(|| built))
    }
}

/// Configures a [`Compiler`].
pub struct CompilerBuilder {
    linker: Option<Box<dyn SchemaLinker>>,
    backends: Vec<Box<dyn Backend>>,
    builtin_backends: bool,
    record_source_locations: bool,
}

impl Default for CompilerBuilder {
    fn default() -> Self {
        CompilerBuilder {
            linker: None,
            backends: Vec::new(),
            builtin_backends: true,
            record_source_locations: true,
        }
    }
}

impl CompilerBuilder {
    pub fn linker(mut self, linker: impl SchemaLinker + 'static) -> Self {
        self.linker = Some(Box::new(linker));
        self
    }

    /// Register a backend. A backend named like a built-in one replaces it.
    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    pub fn without_builtin_backends(mut self) -> Self {
        self.builtin_backends = false;
        self
    }

    pub fn record_source_locations(mut self, record: bool) -> Self {
        self.record_source_locations = record;
        self
    }

    pub fn build(self) -> Compiler {
        let mut backends: BTreeMap<String, Box<dyn Backend>> = BTreeMap::new();
        if self.builtin_backends {
            let mut builtin: Vec<Box<dyn Backend>> = vec![Box::new(RustBackend), Box::new(ProtoBackend)];
            #[cfg(feature = "serde")]
            builtin.push(Box::new(crate::codegen::json::JsonBackend));
            for backend in builtin {
                backends.insert(backend.name().to_string(), backend);
            }
        }
        for backend in self.backends {
            backends.insert(backend.name().to_string(), backend);
        }
        Compiler {
            linker: self.linker.unwrap_or_else(|| Box::new(DefaultLinker)),
            backends,
            record_source_locations: self.record_source_locations,
            well_known: OnceLock::new(),
        }
    }
}

/// A parsed file waiting for its imports.
struct Frame {
    path: String,
    file: FileDescriptor,
    locations: SourceLocationTable,
    next_import: usize,
}

/// State of one `compile` call.
struct Resolution<'c> {
    compiler: &'c Compiler,
    roots: &'c BTreeMap<String, String>,
    resolver: Option<&'c dyn ImportResolver>,
    cache: HashMap<String, Arc<LinkedFile>>,
    in_flight: HashSet<String>,
}

impl<'c> Resolution<'c> {
    /// Link `path` and everything it imports into the cache.
    ///
    /// Depth-first over an explicit stack; the stack holds exactly the
    /// in-flight files, so a cycle is reported with the chain that closes it.
    fn resolve(&mut self, path: &str) -> Result<()> {
        if self.cache.contains_key(path) {
            tracing::debug!(path, "cache hit");
            return Ok(());
        }
        let mut stack = match self.start(path, None)? {
            Some(frame) => vec![frame],
            None => return Ok(()),
        };

        while let Some(top) = stack.last_mut() {
            let next = top.file.dependencies.get(top.next_import).cloned();
            let Some(import) = next else {
                if let Some(frame) = stack.pop() {
                    self.finish(frame)?;
                }
                continue;
            };
            top.next_import += 1;
            let importer = top.path.clone();

            if self.cache.contains_key(&import) {
                tracing::debug!(path = %import, "cache hit");
                continue;
            }
            if self.in_flight.contains(&import) {
                let start = stack.iter().position(|f| f.path == import).unwrap_or(0);
                let mut chain: Vec<String> = stack[start..].iter().map(|f| f.path.clone()).collect();
                chain.push(import.clone());
                return Err(CompileError::CircularDependency { path: import, chain });
            }
            if let Some(frame) = self.start(&import, Some(&importer))? {
                stack.push(frame);
            }
        }
        Ok(())
    }

    /// Find and parse the source of `path`. Well-known files go straight to
    /// the cache and yield no frame.
    fn start(&mut self, path: &str, importer: Option<&str>) -> Result<Option<Frame>> {
        let source: Cow<'c, str> = if let Some(text) = self.roots.get(path) {
            tracing::debug!(path, origin = "root", "resolved");
            Cow::Borrowed(text.as_str())
        } else if let Some(text) = self.resolver.and_then(|r| r.resolve(path)) {
            tracing::debug!(path, origin = "resolver", "resolved");
            Cow::Owned(text)
        } else if well_known::is_well_known(path) {
            if let Some(linked) = self.compiler.well_known()?.get(path) {
                tracing::debug!(path, origin = "well-known", "resolved");
                self.cache.insert(path.to_string(), linked);
                return Ok(None);
            }
            return Err(self.missing(path, importer));
        } else {
            return Err(self.missing(path, importer));
        };

        let (file, locations) = if self.compiler.record_source_locations {
            parser::parse_with_locations(path, &source)?
        } else {
            (parser::parse(path, &source)?, SourceLocationTable::new())
        };
        self.in_flight.insert(path.to_string());
        Ok(Some(Frame {
            path: path.to_string(),
            file,
            locations,
            next_import: 0,
        }))
    }

    fn finish(&mut self, frame: Frame) -> Result<()> {
        let dependencies = frame
            .file
            .dependencies
            .iter()
            .map(|dep| {
                self.cache.get(dep).cloned().ok_or_else(|| LinkError::UnlinkedDependency {
                    file: frame.path.clone(),
                    dependency: dep.clone(),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let linked = self
            .compiler
            .linker
            .link(frame.file, &dependencies)?
            .with_source_locations(frame.locations);
        tracing::debug!(path = %frame.path, types = linked.types_list.len(), "linked");
        self.in_flight.remove(&frame.path);
        self.cache.insert(frame.path, Arc::new(linked));
        Ok(())
    }

    fn missing(&self, path: &str, importer: Option<&str>) -> CompileError {
        CompileError::MissingDependency {
            importer: importer.unwrap_or_default().to_string(),
            path: path.to_string(),
        }
    }
}
