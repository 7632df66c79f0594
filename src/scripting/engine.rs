//! Rhai Script Engine Implementation
//!
//! This module provides the script engine that executes component logic.
//! Each component owns one engine, so the step context below is per component.
//!
//! ## Step Context
//!
//! The following functions are available in component scripts:
//! - `step()` - 1-based index of the current `run` (0 before the first run)
//! - `time()` - Seconds since the component was configured
//! - `dt()` - Seconds since the previous run (0 on the first run)
//!
//! ## Helper Functions
//!
//! - `clamp(x, min, max)` - Limit a value to a range
//! - `lerp(a, b, t)` - Linear interpolation
//! - `map_range(x, in_min, in_max, out_min, out_max)` - Map between ranges
//! - `smooth(current, previous, alpha)` - Exponential smoothing (EWMA)
//! - `deadband(value, center, width)` - Snap small deviations to `center`
//! - `rate_limit(current, previous, max_rate, dt)` - Limit rate of change
//! - `derivative(current, previous, dt)` - Rate of change
//! - `integrate(current, accumulated, dt)` - Running integral

use crate::config::EngineConfig;
use rhai::module_resolvers::{DummyModuleResolver, FileModuleResolver};
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Scope, AST, FLOAT, INT};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Log target for script `print` and `debug` output
pub const SCRIPT_LOG_TARGET: &str = "portbridge::script";

/// Timing data for the step being executed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepContext {
    /// 1-based index of the current run
    pub step: u64,
    /// Seconds since configure
    pub time_secs: f64,
    /// Seconds since the previous run
    pub dt_secs: f64,
}

/// Thread-safe shared step context, read by the registered functions
pub type SharedStepContext = Arc<RwLock<StepContext>>;

/// Produces a [`StepContext`] for each run
#[derive(Debug, Clone, Default)]
pub struct StepClock {
    started: Option<Instant>,
    last_step: Option<Instant>,
    step: u64,
}

impl StepClock {
    /// Start timing; called once by configure
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Advance to the next step
    pub fn tick(&mut self) -> StepContext {
        let now = Instant::now();
        let started = *self.started.get_or_insert(now);
        let dt_secs = self
            .last_step
            .map(|last| now.duration_since(last).as_secs_f64())
            .unwrap_or(0.0);

        self.last_step = Some(now);
        self.step += 1;

        StepContext {
            step: self.step,
            time_secs: now.duration_since(started).as_secs_f64(),
            dt_secs,
        }
    }
}

/// A script function to call as a method, with its curried arguments
#[derive(Debug, Clone)]
pub struct MethodRef {
    pub fn_name: String,
    pub curry: Vec<Dynamic>,
}

/// The script engine for one component
pub struct ScriptEngine {
    /// The Rhai engine instance
    engine: Engine,
    /// Shared context for step functions
    context: SharedStepContext,
}

impl ScriptEngine {
    /// Create an engine with the given limits
    pub fn new(config: &EngineConfig, script_output: bool) -> Self {
        let context = Arc::new(RwLock::new(StepContext::default()));
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, context.clone(), config, script_output);

        Self { engine, context }
    }

    /// Resolve `import` statements relative to `root`
    pub fn set_import_root(&mut self, root: &Path) {
        self.engine
            .set_module_resolver(FileModuleResolver::new_with_path(root));
    }

    /// Configure the Rhai engine with built-in functions and safety limits
    fn configure_engine(
        engine: &mut Engine,
        context: SharedStepContext,
        config: &EngineConfig,
        script_output: bool,
    ) {
        // Set safety limits
        engine.set_max_expr_depths(config.max_expr_depth, config.max_function_expr_depth);
        engine.set_max_call_levels(config.max_call_levels);
        engine.set_max_operations(config.max_operations);
        engine.set_max_string_size(config.max_string_size);
        engine.set_max_array_size(config.max_array_size);
        engine.set_max_map_size(config.max_map_size);
        if !config.allow_imports {
            engine.set_module_resolver(DummyModuleResolver::new());
            engine.set_max_modules(0);
        }

        if script_output {
            engine.on_print(|text| tracing::info!(target: SCRIPT_LOG_TARGET, "{}", text));
            engine.on_debug(|text, source, pos| {
                tracing::debug!(
                    target: SCRIPT_LOG_TARGET,
                    "{} ({} @ {})",
                    text,
                    source.unwrap_or("?"),
                    pos
                )
            });
        } else {
            engine.on_print(|_| {});
            engine.on_debug(|_, _, _| {});
        }

        // ===== Step Context =====

        {
            let ctx = context.clone();
            engine.register_fn("step", move || -> INT {
                ctx.read().map(|c| c.step as INT).unwrap_or(0)
            });
        }
        {
            let ctx = context.clone();
            engine.register_fn("time", move || -> FLOAT {
                ctx.read().map(|c| c.time_secs).unwrap_or(0.0)
            });
        }
        {
            let ctx = context;
            engine.register_fn("dt", move || -> FLOAT {
                ctx.read().map(|c| c.dt_secs).unwrap_or(0.0)
            });
        }

        // ===== Helper Functions =====

        engine.register_fn("clamp", |x: FLOAT, min: FLOAT, max: FLOAT| -> FLOAT {
            if min <= max {
                x.clamp(min, max)
            } else {
                x
            }
        });

        engine.register_fn("lerp", |a: FLOAT, b: FLOAT, t: FLOAT| a + (b - a) * t);

        engine.register_fn(
            "map_range",
            |x: FLOAT, in_min: FLOAT, in_max: FLOAT, out_min: FLOAT, out_max: FLOAT| {
                (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
            },
        );

        // alpha is 0-1, higher = more smoothing
        engine.register_fn(
            "smooth",
            |current: FLOAT, previous: FLOAT, alpha: FLOAT| -> FLOAT {
                let alpha = alpha.clamp(0.0, 1.0);
                if !previous.is_nan() {
                    alpha * previous + (1.0 - alpha) * current
                } else {
                    current
                }
            },
        );

        engine.register_fn(
            "deadband",
            |value: FLOAT, center: FLOAT, width: FLOAT| -> FLOAT {
                if (value - center).abs() < width / 2.0 {
                    center
                } else {
                    value
                }
            },
        );

        engine.register_fn(
            "rate_limit",
            |current: FLOAT, previous: FLOAT, max_rate: FLOAT, dt: FLOAT| -> FLOAT {
                if !previous.is_nan() && dt > 0.0 {
                    let max_change = max_rate * dt;
                    let change = current - previous;
                    if change.abs() > max_change {
                        previous + change.signum() * max_change
                    } else {
                        current
                    }
                } else {
                    current
                }
            },
        );

        engine.register_fn(
            "derivative",
            |current: FLOAT, previous: FLOAT, dt: FLOAT| -> FLOAT {
                if dt > 0.0 && !previous.is_nan() {
                    (current - previous) / dt
                } else {
                    0.0
                }
            },
        );

        engine.register_fn(
            "integrate",
            |current: FLOAT, accumulated: FLOAT, dt: FLOAT| -> FLOAT {
                if !accumulated.is_nan() {
                    accumulated + current * dt
                } else {
                    current * dt
                }
            },
        );
    }

    /// Publish the context for the step about to run
    pub fn begin_step(&self, ctx: StepContext) {
        match self.context.write() {
            Ok(mut context) => *context = ctx,
            Err(poisoned) => *poisoned.into_inner() = ctx,
        }
    }

    /// Evaluate the top-level statements of a module into `scope`
    pub fn run_module(
        &self,
        scope: &mut Scope<'static>,
        ast: &AST,
    ) -> Result<(), Box<EvalAltResult>> {
        self.engine.run_ast_with_scope(scope, ast)
    }

    /// Call a zero-argument script function and return its result
    pub fn call_function(
        &self,
        scope: &mut Scope<'static>,
        ast: &AST,
        name: &str,
    ) -> Result<Dynamic, Box<EvalAltResult>> {
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        self.engine
            .call_fn_with_options::<Dynamic>(options, scope, ast, name, ())
    }

    /// Call `method` with `this` bound to `instance`
    pub fn call_method(
        &self,
        scope: &mut Scope<'static>,
        ast: &AST,
        instance: &mut Dynamic,
        method: &MethodRef,
    ) -> Result<Dynamic, Box<EvalAltResult>> {
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(instance);
        self.engine.call_fn_with_options::<Dynamic>(
            options,
            scope,
            ast,
            &method.fn_name,
            method.curry.clone(),
        )
    }

    /// Get a reference to the underlying Rhai engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Get a reference to the shared context
    pub fn context(&self) -> &SharedStepContext {
        &self.context
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default(), true)
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("context", &self.context.read().ok().map(|c| c.clone()))
            .finish()
    }
}
