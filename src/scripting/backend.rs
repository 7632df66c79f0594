//! Rhai implementation of [`ComponentBackend`]

use super::convert::{read_outports, write_outports};
use super::engine::{MethodRef, ScriptEngine, StepClock};
use super::{is_valid_identifier, CompiledModule, SharedModuleCache};
use crate::component::{ComponentBackend, ComponentSource};
use crate::config::HostConfig;
use crate::error::{ComponentError, Result};
use crate::port::PortTable;
use rhai::{Dynamic, FnPtr, Map, Scope};

const RUN_METHOD: &str = "run";
const CONFIGURE_METHOD: &str = "configure";

/// A component instance living in its own Rhai engine
pub struct RhaiBackend {
    engine: ScriptEngine,
    module: CompiledModule,
    /// Module-level variables left by the top-level statements
    scope: Scope<'static>,
    /// The object map returned by the class constructor
    instance: Dynamic,
    clock: StepClock,
    /// Resolved by configure
    run_method: Option<MethodRef>,
    /// `module::Class`, for messages
    label: String,
}

impl RhaiBackend {
    /// Read, compile and instantiate `source`.
    ///
    /// Every failure is a [`ComponentError::Load`].
    pub fn load(
        config: &HostConfig,
        cache: &SharedModuleCache,
        source: &ComponentSource,
    ) -> Result<Self> {
        let label = format!("{}::{}", source.module_name, source.class_name);

        if !is_valid_identifier(&source.module_name) {
            return Err(ComponentError::Load(format!(
                "'{}' is not a valid module name",
                source.module_name
            )));
        }

        let text = std::fs::read_to_string(&source.file_name).map_err(|e| {
            ComponentError::Load(format!(
                "Failed to read {}: {}",
                source.file_name.display(),
                e
            ))
        })?;

        let mut engine = ScriptEngine::new(&config.engine, config.logging.script_output);
        if config.engine.allow_imports {
            if let Some(dir) = source.file_name.parent() {
                engine.set_import_root(dir);
            }
        }

        let mut module = {
            let mut cache = cache.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.get_or_compile(engine.engine(), &source.module_name, &text)?
        };
        module.set_origin(&source.file_name);

        if !module.has_function(&source.class_name, 0) {
            return Err(ComponentError::Load(format!(
                "module '{}' has no class '{}'",
                source.module_name, source.class_name
            )));
        }

        let mut scope = Scope::new();
        engine.run_module(&mut scope, module.ast()).map_err(|e| {
            ComponentError::Load(format!("module '{}' failed: {}", source.module_name, e))
        })?;

        let instance = engine
            .call_function(&mut scope, module.ast(), &source.class_name)
            .map_err(|e| ComponentError::Load(format!("constructor {} failed: {}", label, e)))?;

        if !instance.is_map() {
            return Err(ComponentError::Load(format!(
                "constructor {} returned {}, expected an object map",
                label,
                instance.type_name()
            )));
        }

        tracing::debug!("Instantiated {} from {}", label, source.file_name.display());
        Ok(Self {
            engine,
            module,
            scope,
            instance,
            clock: StepClock::default(),
            run_method: None,
            label,
        })
    }

    /// The instance as the script sees it
    pub fn instance(&self) -> &Dynamic {
        &self.instance
    }

    /// Find the method `name` on the instance: a function-pointer property
    /// first, then a zero-parameter function of the same name.
    ///
    /// A property that is not a function pointer hides the function.
    fn resolve_method(&self, name: &str) -> Option<MethodRef> {
        let property = {
            let map = self.instance.read_lock::<Map>()?;
            let found = map.get(name).map(|prop| {
                prop.read_lock::<FnPtr>().map(|ptr| MethodRef {
                    fn_name: ptr.fn_name().to_string(),
                    curry: ptr.curry().to_vec(),
                })
            });
            found
        };

        match property {
            Some(method) => method,
            None => self.module.has_function(name, 0).then(|| MethodRef {
                fn_name: name.to_string(),
                curry: Vec::new(),
            }),
        }
    }

    /// Resolve a method and check that its function takes the curried
    /// arguments
    fn callable_method(&self, name: &str) -> Result<Option<MethodRef>> {
        let Some(method) = self.resolve_method(name) else {
            return Ok(None);
        };
        if !self.module.has_function(&method.fn_name, method.curry.len()) {
            return Err(ComponentError::Configuration(format!(
                "{}: '{}' refers to '{}', which is not a function taking {} argument(s)",
                self.label,
                name,
                method.fn_name,
                method.curry.len()
            )));
        }
        Ok(Some(method))
    }
}

impl ComponentBackend for RhaiBackend {
    /// Resolve `run`, call `configure` if present, then check the ports
    fn configure(&mut self) -> Result<()> {
        let run = self.callable_method(RUN_METHOD)?.ok_or_else(|| {
            ComponentError::Configuration(format!("{} has no '{}' method", self.label, RUN_METHOD))
        })?;

        if let Some(configure) = self.callable_method(CONFIGURE_METHOD)? {
            self.engine
                .call_method(&mut self.scope, self.module.ast(), &mut self.instance, &configure)
                .map(|_| ())
                .map_err(|e| {
                    ComponentError::Configuration(format!("{} configure failed: {}", self.label, e))
                })?;
        }

        read_outports(&self.instance)
            .map_err(|e| ComponentError::Configuration(format!("{}: {}", self.label, e)))?;

        self.run_method = Some(run);
        self.clock.start();
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let method = self.run_method.as_ref().ok_or_else(|| {
            ComponentError::Execution(format!("{} is not configured", self.label))
        })?;

        self.engine.begin_step(self.clock.tick());
        self.engine
            .call_method(&mut self.scope, self.module.ast(), &mut self.instance, method)
            .map(|_| ())
            .map_err(|e| ComponentError::Execution(format!("{}: {}", self.label, e)))
    }

    fn read_ports(&self) -> Result<PortTable> {
        read_outports(&self.instance)
            .map_err(|e| ComponentError::Introspection(format!("{}: {}", self.label, e)))
    }

    fn write_ports(&mut self, table: &PortTable) -> Result<()> {
        write_outports(&mut self.instance, table)
            .map_err(|e| ComponentError::Execution(format!("{}: {}", self.label, e)))
    }

    fn is_intact(&self) -> bool {
        self.instance.is_map()
    }
}

impl std::fmt::Debug for RhaiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiBackend")
            .field("label", &self.label)
            .field("module", &self.module)
            .field("configured", &self.run_method.is_some())
            .finish()
    }
}
