//! Isolated execution contexts.
//!
//! Each script gets its own engine instance. Artifact modules are compiled
//! per context into a private module resolver; lookup falls back to the
//! shared base modules only when the private set has no match, so a script
//! can shadow a base module without affecting other scripts.

use crate::error::{ContextError, ContextResult};
use crate::identity::ScriptIdentity;
use rhai::module_resolvers::{ModuleResolversCollection, StaticModuleResolver};
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Module, Scope, AST};
use runeforge_resolver::ResolvedArtifact;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Execution limits applied to every script engine so a runaway script
/// cannot wedge a worker.
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    /// Maximum operations per evaluation; 0 disables the limit.
    pub max_operations: u64,

    /// Maximum function call nesting depth.
    pub max_call_depth: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_operations: 500_000,
            max_call_depth: 64,
        }
    }
}

/// Builds isolated script contexts.
///
/// Base modules registered on the loader form the shared host-provided
/// surface every context can import; they are never mutated by scripts.
pub struct ContextLoader {
    base: StaticModuleResolver,
    limits: EngineLimits,
}

impl ContextLoader {
    /// Create a loader with the given engine limits.
    pub fn new(limits: EngineLimits) -> Self {
        Self {
            base: StaticModuleResolver::new(),
            limits,
        }
    }

    /// Register a shared base module importable by every script.
    pub fn add_base_module(&mut self, name: impl Into<String>, module: Module) {
        self.base.insert(name.into(), module);
    }

    /// Construct a context for `identity` with the given artifacts visible.
    ///
    /// `prior` is the identity's previous context when one still exists; a
    /// live (not torn down) prior context is a construction conflict, since
    /// the old context must be fully torn down before a replacement exists.
    pub fn create_context(
        &self,
        identity: ScriptIdentity,
        artifacts: &[ResolvedArtifact],
        prior: Option<&ScriptContext>,
    ) -> ContextResult<ScriptContext> {
        if let Some(previous) = prior {
            if !previous.is_torn_down() {
                return Err(ContextError::TeardownConflict(identity.to_string()));
            }
        }

        let mut engine = Engine::new();
        if self.limits.max_operations > 0 {
            engine.set_max_operations(self.limits.max_operations);
        }
        engine.set_max_call_levels(self.limits.max_call_depth);

        // Compile each artifact into this context's private resolver. The
        // chain is rebuilt per artifact so later artifacts can import
        // earlier ones as well as the base modules.
        let mut private = StaticModuleResolver::new();
        for artifact in artifacts {
            engine.set_module_resolver(chain(&private, &self.base));

            let source = std::fs::read_to_string(&artifact.path)?;
            let module = compile_artifact(&engine, artifact, &source)?;
            private.insert(artifact.coordinate.artifact.clone(), module);
        }
        engine.set_module_resolver(chain(&private, &self.base));

        debug!(
            "Created context for {} with {} artifact(s)",
            identity,
            artifacts.len()
        );

        Ok(ScriptContext {
            identity,
            engine,
            scope: Scope::new(),
            ast: None,
            artifacts: artifacts.to_vec(),
            cancelled: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
            torn_down: false,
        })
    }
}

fn chain(private: &StaticModuleResolver, base: &StaticModuleResolver) -> ModuleResolversCollection {
    let mut resolvers = ModuleResolversCollection::new();
    resolvers.push(private.clone());
    resolvers.push(base.clone());
    resolvers
}

fn compile_artifact(
    engine: &Engine,
    artifact: &ResolvedArtifact,
    source: &str,
) -> ContextResult<Module> {
    let malformed = |message: String| ContextError::MalformedArtifact {
        coordinate: artifact.coordinate.to_string(),
        message,
    };

    let ast = engine
        .compile(source)
        .map_err(|e| malformed(e.to_string()))?;

    Module::eval_ast_as_new(Scope::new(), &ast, engine).map_err(|e| malformed(e.to_string()))
}

/// One script's isolated execution environment.
///
/// Owns the engine, the evaluated global scope, the compiled script, and the
/// cancellation flag consumed by pending host submissions. The registry entry
/// is the sole long-lived owner.
pub struct ScriptContext {
    identity: ScriptIdentity,
    engine: Engine,
    scope: Scope<'static>,
    ast: Option<AST>,
    artifacts: Vec<ResolvedArtifact>,
    cancelled: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    torn_down: bool,
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("identity", &self.identity)
            .field("artifacts", &self.artifacts.len())
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl ScriptContext {
    /// The identity this context belongs to.
    pub fn identity(&self) -> &ScriptIdentity {
        &self.identity
    }

    /// Artifacts visible to this context.
    pub fn artifacts(&self) -> &[ResolvedArtifact] {
        &self.artifacts
    }

    /// Engine access for installing the host surface before evaluation.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// The evaluated global scope.
    pub fn scope(&self) -> &Scope<'static> {
        &self.scope
    }

    /// Cancellation flag shared with pending host submissions; set on
    /// teardown so a cancelled task never executes its body.
    pub fn cancellation(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Track a background task owned by this context.
    pub fn add_task(&mut self, handle: JoinHandle<()>) {
        self.tasks.push(handle);
    }

    /// Compile and run the script's top-level code.
    pub fn eval(&mut self, source: &str) -> ContextResult<()> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| self.script_error(e.to_string()))?;

        self.engine
            .run_ast_with_scope(&mut self.scope, &ast)
            .map_err(|e| self.script_error(e.to_string()))?;

        self.ast = Some(ast);
        Ok(())
    }

    /// Call a function defined by the script.
    ///
    /// Top-level statements are not re-run; only the script's function
    /// definitions are in view.
    pub fn call_fn(&mut self, name: &str, args: impl FuncArgs) -> ContextResult<Dynamic> {
        let ast = self
            .ast
            .as_ref()
            .ok_or_else(|| self.script_error("script has not been evaluated".to_string()))?;

        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        self.engine
            .call_fn_with_options(options, &mut self.scope, ast, name, args)
            .map_err(|e| self.script_error(e.to_string()))
    }

    /// Call a function the script may or may not define.
    ///
    /// Returns `false` when the function is absent; absence is not an error.
    pub fn call_optional_fn(&mut self, name: &str) -> ContextResult<bool> {
        let Some(ast) = self.ast.as_ref() else {
            return Ok(false);
        };

        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        match self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut self.scope,
            ast,
            name,
            (),
        ) {
            Ok(_) => Ok(true),
            Err(e) if is_function_not_found(&e, name) => Ok(false),
            Err(e) => Err(ContextError::Script {
                identity: self.identity.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Whether teardown has completed.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Release everything this context owns: flag pending host submissions
    /// as cancelled and abort background tasks. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }

        self.cancelled.store(true, Ordering::SeqCst);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.torn_down = true;
        debug!("Tore down context for {}", self.identity);
    }

    fn script_error(&self, message: String) -> ContextError {
        ContextError::Script {
            identity: self.identity.to_string(),
            message,
        }
    }
}

impl Drop for ScriptContext {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn is_function_not_found(err: &EvalAltResult, name: &str) -> bool {
    match err {
        EvalAltResult::ErrorFunctionNotFound(signature, _) => signature
            .split(' ')
            .next()
            .map_or(false, |found| found == name),
        _ => false,
    }
}
