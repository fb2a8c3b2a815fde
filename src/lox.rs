use crate::ast::{NodeIds, Statement};
use crate::diagnostics::{Diagnostics, LoxError};
use crate::interpreter::Interpreter;
use crate::parser;
use crate::resolver;
use crate::scanner;
use std::io::Write;

/// How a call to [`Lox::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// A scan, parse or resolve error; nothing was evaluated.
    StaticError,
    /// Evaluation stopped at a runtime error.
    RuntimeError,
}

impl Outcome {
    /// Process exit status for a script run, following sysexits.h.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Ok => 0,
            Outcome::StaticError => 65,
            Outcome::RuntimeError => 70,
        }
    }
}

/// One interpreter session.
///
/// Globals, resolved bindings and node ids persist across `run` calls, so a
/// prompt can define something on one line and use it on the next.
pub struct Lox<'o> {
    interpreter: Interpreter<'o>,
    diagnostics: Diagnostics,
    ids: NodeIds,
}

impl<'o> Lox<'o> {
    pub fn new(out: &'o mut dyn Write) -> Lox<'o> {
        Lox {
            interpreter: Interpreter::new(out),
            diagnostics: Diagnostics::new(),
            ids: NodeIds::new(),
        }
    }

    /// Scans, parses, resolves and evaluates `source`. Errors from this run
    /// are left in [`Lox::diagnostics`]; earlier ones are discarded.
    pub fn run(&mut self, source: &str) -> Outcome {
        self.diagnostics.clear();
        let statements = match self.syntax_tree(source) {
            Some(statements) => statements,
            None => return Outcome::StaticError,
        };
        match resolver::resolve(&statements) {
            Ok(locals) => self.interpreter.resolve(locals),
            Err(e) => {
                self.diagnostics.report(e);
                return Outcome::StaticError;
            }
        }
        match self.interpreter.interpret(&statements) {
            Ok(()) => Outcome::Ok,
            Err(e) => {
                self.diagnostics.report(e);
                Outcome::RuntimeError
            }
        }
    }

    /// Scans and parses `source` without evaluating it. Returns `None` if
    /// any error was reported. Scan errors stop the pipeline before parsing.
    pub fn syntax_tree(&mut self, source: &str) -> Option<Vec<Statement>> {
        let (tokens, scan_errors) = scanner::scan_tokens(source);
        if !scan_errors.is_empty() {
            for e in scan_errors {
                self.diagnostics.report(e);
            }
            return None;
        }
        let (statements, parse_errors) = parser::parse(&tokens, &mut self.ids);
        if !parse_errors.is_empty() {
            for e in parse_errors {
                self.diagnostics.report(e);
            }
            return None;
        }
        Some(statements)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_errors(&mut self) -> Vec<LoxError> {
        self.diagnostics.drain()
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::LoxError;
    use crate::lox::{Lox, Outcome};

    #[test]
    fn exit_codes() {
        assert_eq!(Outcome::Ok.exit_code(), 0);
        assert_eq!(Outcome::StaticError.exit_code(), 65);
        assert_eq!(Outcome::RuntimeError.exit_code(), 70);
    }

    #[test]
    fn scan_errors_stop_before_parsing() {
        let mut out: Vec<u8> = Vec::new();
        let mut lox = Lox::new(&mut out);
        assert_eq!(lox.run("print 1; @ print ;"), Outcome::StaticError);
        let errors = lox.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LoxError::Scan(_)));
    }

    #[test]
    fn all_parse_errors_are_reported() {
        let mut out: Vec<u8> = Vec::new();
        let mut lox = Lox::new(&mut out);
        assert_eq!(lox.run("var = 1; print 2; fun (;"), Outcome::StaticError);
        assert!(lox.diagnostics().had_error());
        assert_eq!(lox.diagnostics().errors().len(), 2);
    }

    #[test]
    fn each_run_starts_with_fresh_diagnostics() {
        let mut out: Vec<u8> = Vec::new();
        let mut lox = Lox::new(&mut out);
        assert_eq!(lox.run("print nope;"), Outcome::RuntimeError);
        assert!(lox.diagnostics().had_runtime_error());
        assert_eq!(lox.run("print 1;"), Outcome::Ok);
        assert!(lox.diagnostics().is_empty());
    }
}
