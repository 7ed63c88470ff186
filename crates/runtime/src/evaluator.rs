//! Instruction evaluators
//!
//! One evaluator per instruction kind, driven by [`Executor::run_body`] for
//! each delivered message. Evaluators take explicit handles (the agent's
//! memory, the borrowed message, the agency and methodology), never global
//! state. Failures degrade: an evaluator logs and produces a zero result,
//! and the remaining instructions of the body still run.
//!
//! The current agent is detached from the agency while its body runs, so
//! the executor can hold its memory mutably while routing sends to other
//! agents; sends and exits addressed to the current agent are applied to
//! the detached agent directly.

use crate::agency::Agency;
use crate::agent::Agent;
use crate::method::Method;
use crate::methodology::{Methodology, VersionSelector};
use agerun_core::{Log, MapValue, Value, Version};
use agerun_lang::{
    EvalScope, Evaluated, ExpressionAst, FunctionCall, InstructionAst, InstructionParser,
    MemoryPath, build_with_template, evaluate, parse_with_template,
};
use std::rc::Rc;

/// Borrowed runtime services for one message execution.
pub struct Executor<'a> {
    agency: &'a mut Agency,
    methodology: &'a mut Methodology,
    parser: &'a InstructionParser,
    log: &'a Log,
}

impl<'a> Executor<'a> {
    pub fn new(
        agency: &'a mut Agency,
        methodology: &'a mut Methodology,
        parser: &'a InstructionParser,
        log: &'a Log,
    ) -> Self {
        Executor {
            agency,
            methodology,
            parser,
            log,
        }
    }

    /// Run the agent's whole method body against one message, in source
    /// order. Individual instruction failures never abort the rest.
    pub fn run_body(&mut self, agent: &mut Agent, message: &Value) {
        let method = Rc::clone(agent.method());
        tracing::trace!(
            agent = agent.id(),
            method = method.name(),
            "processing message"
        );
        for instruction in method.instructions() {
            self.execute(instruction, agent, message);
        }
    }

    fn execute(&mut self, instruction: &InstructionAst, agent: &mut Agent, message: &Value) {
        match instruction {
            InstructionAst::Assignment { target, expression } => {
                self.eval_assignment(target, expression, agent, message);
            }
            InstructionAst::Send(call) => {
                let result = self.eval_send(call, agent, message);
                self.store_result(call, agent, result);
            }
            InstructionAst::If(call) => {
                let result = self.eval_if(call, agent, message);
                self.store_result(call, agent, result);
            }
            InstructionAst::Create(call) => {
                let result = self.eval_create(call, agent, message);
                self.store_result(call, agent, result);
            }
            InstructionAst::Exit(call) => {
                let result = self.eval_exit(call, agent, message);
                self.store_result(call, agent, result);
            }
            InstructionAst::Parse(call) => {
                let result = self.eval_parse(call, agent, message);
                self.store_result(call, agent, result);
            }
            InstructionAst::Build(call) => {
                let result = self.eval_build(call, agent, message);
                self.store_result(call, agent, result);
            }
            InstructionAst::Method(call) => {
                let result = self.eval_method(call, agent, message);
                self.store_result(call, agent, result);
            }
            InstructionAst::DestroyMethod(call) => {
                let result = self.eval_destroy_method(call, agent, message);
                self.store_result(call, agent, result);
            }
        }
    }

    /// Evaluate an argument expression to an owned value (deep-copied when
    /// the expression yielded a reference into agent state).
    fn eval_owned(&self, expr: &ExpressionAst, agent: &Agent, message: &Value) -> Option<Value> {
        let scope = EvalScope {
            memory: agent.memory(),
            message: Some(message),
            context: agent.context(),
        };
        evaluate(expr, &scope, self.log).map(Evaluated::into_owned)
    }

    /// Assignment never aborts the body: a failed right-hand side stores
    /// integer 0.
    fn eval_assignment(
        &mut self,
        target: &MemoryPath,
        expression: &ExpressionAst,
        agent: &mut Agent,
        message: &Value,
    ) {
        let value = self
            .eval_owned(expression, agent, message)
            .unwrap_or(Value::Integer(0));
        self.write_memory(agent, target, value);
    }

    fn eval_send(&mut self, call: &FunctionCall, agent: &mut Agent, message: &Value) -> Value {
        let target = self
            .eval_owned(call.arg(0), agent, message)
            .map(|v| v.as_integer())
            .unwrap_or(0);
        let payload = self.eval_owned(call.arg(1), agent, message);
        if target == 0 {
            // Discard-the-message target: success, nothing enqueued.
            return Value::Integer(1);
        }
        let Some(payload) = payload else {
            self.log.error("send: message expression evaluated to nothing");
            return Value::Integer(0);
        };
        if target == agent.id() {
            agent.enqueue(payload);
            return Value::Integer(1);
        }
        if self.agency.send_to_agent(target, payload) {
            Value::Integer(1)
        } else {
            self.log.error(format!("send: no agent with id {}", target));
            Value::Integer(0)
        }
    }

    /// Short-circuit: only the selected branch expression is evaluated.
    fn eval_if(&mut self, call: &FunctionCall, agent: &mut Agent, message: &Value) -> Value {
        let condition = self.eval_owned(call.arg(0), agent, message);
        let truthy = matches!(condition, Some(Value::Integer(n)) if n != 0);
        let branch = if truthy { call.arg(1) } else { call.arg(2) };
        self.eval_owned(branch, agent, message)
            .unwrap_or(Value::Integer(0))
    }

    fn eval_create(&mut self, call: &FunctionCall, agent: &mut Agent, message: &Value) -> Value {
        let Some(name) = self.string_arg(call, 0, agent, message, "create: method name") else {
            return Value::Integer(0);
        };
        let Some(selector) = self
            .eval_owned(call.arg(1), agent, message)
            .as_ref()
            .and_then(version_selector_from)
        else {
            self.log.error("create: invalid version argument");
            return Value::Integer(0);
        };
        let context = if call.arg_count() == 3 {
            match self.eval_owned(call.arg(2), agent, message) {
                Some(Value::Map(map)) => Some(map),
                _ => {
                    self.log.error("create: context must be a map");
                    return Value::Integer(0);
                }
            }
        } else {
            None
        };
        let Some(method) = self.methodology.resolve(&name, &selector) else {
            self.log
                .error(format!("create: no method '{}' version {}", name, selector));
            return Value::Integer(0);
        };
        Value::Integer(self.agency.create_agent(method, context))
    }

    fn eval_exit(&mut self, call: &FunctionCall, agent: &mut Agent, message: &Value) -> Value {
        let id = self
            .eval_owned(call.arg(0), agent, message)
            .map(|v| v.as_integer())
            .unwrap_or(0);
        let ok = if id == agent.id() {
            // Self-exit is deferred: the dispatch loop releases the agent
            // once the sleep message it enqueues here is processed.
            agent.begin_exit()
        } else {
            self.agency.exit_agent(id)
        };
        if !ok {
            self.log.error(format!("exit: no agent with id {}", id));
        }
        Value::Integer(ok as i64)
    }

    fn eval_parse(&mut self, call: &FunctionCall, agent: &mut Agent, message: &Value) -> Value {
        let template = self.string_arg(call, 0, agent, message, "parse: template");
        let input = self.string_arg(call, 1, agent, message, "parse: input");
        match (template, input) {
            (Some(template), Some(input)) => {
                Value::Map(parse_with_template(&template, &input))
            }
            _ => Value::Map(MapValue::new()),
        }
    }

    fn eval_build(&mut self, call: &FunctionCall, agent: &mut Agent, message: &Value) -> Value {
        let Some(template) = self.string_arg(call, 0, agent, message, "build: template") else {
            return Value::String(String::new());
        };
        let values = match self.eval_owned(call.arg(1), agent, message) {
            Some(Value::Map(map)) => map,
            _ => {
                self.log.error("build: values must be a map");
                MapValue::new()
            }
        };
        Value::String(build_with_template(&template, &values))
    }

    fn eval_method(&mut self, call: &FunctionCall, agent: &mut Agent, message: &Value) -> Value {
        let Some(name) = self.string_arg(call, 0, agent, message, "method: name") else {
            return Value::Integer(0);
        };
        let Some(body) = self.string_arg(call, 1, agent, message, "method: body") else {
            return Value::Integer(0);
        };
        let Some(version) = self
            .eval_owned(call.arg(2), agent, message)
            .as_ref()
            .and_then(exact_version_from)
        else {
            self.log.error("method: invalid version argument");
            return Value::Integer(0);
        };
        let method = match Method::compile(self.parser, name.clone(), version, body) {
            Ok(method) => method,
            Err(error) => {
                self.log
                    .error(format!("method '{}': {}", name, error));
                return Value::Integer(0);
            }
        };
        match self.methodology.register(method) {
            Ok(_) => {
                tracing::debug!(method = %name, version = %version, "method registered");
                Value::Integer(1)
            }
            Err(error) => {
                self.log.error(error.to_string());
                Value::Integer(0)
            }
        }
    }

    fn eval_destroy_method(
        &mut self,
        call: &FunctionCall,
        agent: &mut Agent,
        message: &Value,
    ) -> Value {
        let Some(name) = self.string_arg(call, 0, agent, message, "destroy: method name") else {
            return Value::Integer(0);
        };
        let Some(version) = self
            .eval_owned(call.arg(1), agent, message)
            .as_ref()
            .and_then(exact_version_from)
        else {
            self.log.error("destroy: invalid version argument");
            return Value::Integer(0);
        };
        // The current agent is detached from the agency, so check it too.
        let in_use = self.agency.uses_method(&name, version)
            || (agent.method().name() == name && agent.method().version() == version);
        if in_use {
            self.log.error(format!(
                "destroy: method '{}' version {} still has live agents",
                name, version
            ));
            return Value::Integer(0);
        }
        if self.methodology.unregister(&name, version) {
            Value::Integer(1)
        } else {
            self.log
                .error(format!("destroy: no method '{}' version {}", name, version));
            Value::Integer(0)
        }
    }

    /// Evaluate an argument that must be a string.
    fn string_arg(
        &self,
        call: &FunctionCall,
        index: usize,
        agent: &Agent,
        message: &Value,
        what: &str,
    ) -> Option<String> {
        match self.eval_owned(call.arg(index), agent, message) {
            Some(Value::String(s)) => Some(s),
            _ => {
                self.log.error(format!("{} must be a string", what));
                None
            }
        }
    }

    /// Write an evaluator's result through the optional `memory.path :=`
    /// target.
    fn store_result(&mut self, call: &FunctionCall, agent: &mut Agent, result: Value) {
        if let Some(path) = call.result_path.clone() {
            self.write_memory(agent, &path, result);
        }
    }

    fn write_memory(&mut self, agent: &mut Agent, path: &MemoryPath, value: Value) {
        if agent.memory_mut().set_path(&path.key_path(), value).is_err() {
            self.log
                .error(format!("cannot assign through non-map value at '{}'", path));
        }
    }
}

/// Version argument for `create`: `"latest"`, a version string, or an
/// integer major version.
fn version_selector_from(value: &Value) -> Option<VersionSelector> {
    match value {
        Value::String(s) => VersionSelector::parse(s),
        Value::Integer(n) => u32::try_from(*n)
            .ok()
            .map(|major| VersionSelector::Exact(Version::new(major, 0, 0))),
        _ => None,
    }
}

/// Version argument for `method`/`destroy`, where `"latest"` makes no sense.
fn exact_version_from(value: &Value) -> Option<Version> {
    match version_selector_from(value)? {
        VersionSelector::Exact(version) => Some(version),
        VersionSelector::Latest => None,
    }
}
