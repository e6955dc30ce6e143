//! Transform stages.
//!
//! A stage is one composable source-to-source transformation applied
//! to every module body before concatenation. Each stage is a pure
//! function over the source text and a [`StageContext`]; stages never
//! touch ambient process state - the environment snapshot is taken
//! once by the orchestrator and handed in through the context.
//!
//! The configuration maps onto an ordered stage list in [`plan`]:
//! syntax restriction always runs first, module lowering belongs to
//! the modern-syntax preset, debug-call stripping rides along with
//! minification (the task-runner contract couples those two concerns
//! under one flag), and the transpile stage runs last for
//! modern-syntax or react builds, lowering syntax to the down-level
//! target and rewriting JSX.

use std::collections::BTreeMap;
use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPatternKind, CallExpression, Declaration, ExportDefaultDeclarationKind, Expression,
    ImportDeclarationSpecifier, Program, Statement, StaticMemberExpression,
};
use oxc_ast_visit::{walk, Visit};
use oxc_codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_transformer::{
    ArrowFunctionsOptions, ESTarget, JsxOptions, JsxRuntime, TransformOptions, Transformer,
};

use crate::options::BuildOptions;
use crate::{BuildError, Result};

/// One syntax-rewriting unit of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parse under the finalized-syntax goal; reject anything the
    /// grammar does not accept, naming the offending token.
    RestrictSyntax,
    /// Rewrite top-level ESM import/export declarations to the
    /// CommonJS form expected by the loader prologue.
    LowerModules,
    /// Substitute `process.env.NAME` references with the serialized
    /// build-time value, or the literal `undefined` token.
    InlineEnv,
    /// Replace `console.log(...)` call expressions with `void 0`.
    StripDebugCalls,
    /// Run the oxc transformer over the module. With `target` set,
    /// modern syntax is lowered to the down-level target (class
    /// declarations pass through untouched - oxc carries no class
    /// lowering). With `jsx` set, JSX elements are rewritten to
    /// classic `React.createElement` calls.
    Transpile { target: bool, jsx: bool },
}

/// Context handed to every stage invocation.
pub struct StageContext<'a> {
    /// Build-time environment snapshot.
    pub env: &'a BTreeMap<String, String>,
    /// Module path, for error attribution.
    pub file: &'a Path,
    /// Parse module bodies with the JSX grammar.
    pub jsx: bool,
}

/// Map the configuration onto the ordered stage list.
pub fn plan(options: &BuildOptions) -> Vec<Stage> {
    let mut stages = vec![Stage::RestrictSyntax];
    if options.modern_syntax {
        stages.push(Stage::LowerModules);
    }
    stages.push(Stage::InlineEnv);
    if options.minify {
        stages.push(Stage::StripDebugCalls);
    }
    if options.modern_syntax || options.react {
        stages.push(Stage::Transpile {
            target: options.modern_syntax,
            jsx: options.react,
        });
    }
    stages
}

/// Run the ordered stage list over one module body.
pub fn apply_all(stages: &[Stage], source: &str, ctx: &StageContext<'_>) -> Result<String> {
    let mut text = source.to_string();
    for stage in stages {
        text = stage.apply(&text, ctx)?;
    }
    Ok(text)
}

impl Stage {
    /// Apply this stage to one module body.
    pub fn apply(&self, source: &str, ctx: &StageContext<'_>) -> Result<String> {
        match self {
            Stage::RestrictSyntax => {
                let allocator = Allocator::default();
                parse_program(&allocator, source, ctx.file, ctx.jsx)?;
                Ok(source.to_string())
            }
            Stage::LowerModules => {
                let allocator = Allocator::default();
                let program = parse_program(&allocator, source, ctx.file, ctx.jsx)?;
                Ok(lower_modules(source, &program))
            }
            Stage::InlineEnv => {
                let allocator = Allocator::default();
                let program = parse_program(&allocator, source, ctx.file, ctx.jsx)?;
                let mut inliner = EnvInliner {
                    env: ctx.env,
                    edits: Vec::new(),
                };
                walk::walk_program(&mut inliner, &program);
                Ok(splice(source, inliner.edits))
            }
            Stage::StripDebugCalls => strip_debug_calls(source, ctx.file, ctx.jsx),
            Stage::Transpile { target, jsx } => transpile(source, ctx, *target, *jsx),
        }
    }
}

/// Lower the module through the oxc transformer. The down-level
/// target rewrites arrows, spreads, and the rest of the modern
/// grammar; JSX becomes classic `React.createElement` calls.
fn transpile(source: &str, ctx: &StageContext<'_>, target: bool, jsx: bool) -> Result<String> {
    let allocator = Allocator::default();
    let mut program = parse_program(&allocator, source, ctx.file, ctx.jsx)?;

    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();

    let mut options = if target {
        let mut options = TransformOptions::from(ESTarget::ES2015);
        options.env.es2015.arrow_function = Some(ArrowFunctionsOptions::default());
        options
    } else {
        TransformOptions::default()
    };
    if jsx {
        options.jsx = JsxOptions {
            runtime: JsxRuntime::Classic,
            ..JsxOptions::default()
        };
    }

    let transformed =
        Transformer::new(&allocator, ctx.file, &options).build_with_scoping(scoping, &mut program);
    if !transformed.errors.is_empty() {
        let message = transformed
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(BuildError::Transform {
            file: ctx.file.display().to_string(),
            message,
        });
    }

    Ok(Codegen::new().build(&program).code)
}

/// Replace `console.log(...)` call expressions with `void 0`. Also
/// used by the assembler to scrub injected library code before the
/// terminal minification pass.
pub(crate) fn strip_debug_calls(source: &str, file: &Path, jsx: bool) -> Result<String> {
    let allocator = Allocator::default();
    let program = parse_program(&allocator, source, file, jsx)?;
    let mut stripper = DebugCallStripper { edits: Vec::new() };
    walk::walk_program(&mut stripper, &program);
    Ok(splice(source, stripper.edits))
}

/// Collapse an assembled bundle to a single line, dropping comments.
/// Used by the assembler for the terminal minification pass.
pub(crate) fn minify_source(source: &str, label: &Path) -> Result<String> {
    let allocator = Allocator::default();
    let program = parse_program(&allocator, source, label, false)?;
    let output = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .build(&program);
    Ok(output.code)
}

/// Parse under the finalized-syntax goal. Any parse error is a
/// [`BuildError::Syntax`] carrying the parser's description of the
/// unexpected input.
pub(crate) fn parse_program<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    file: &Path,
    jsx: bool,
) -> Result<Program<'a>> {
    let source_type = if jsx {
        SourceType::jsx()
    } else {
        SourceType::mjs()
    };
    let parsed = Parser::new(allocator, source, source_type).parse();
    if !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(BuildError::Syntax {
            file: file.display().to_string(),
            message,
        });
    }
    Ok(parsed.program)
}

/// Serialize a value as a quoted JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

/// Apply span edits to the source text. Later spans win their slice;
/// overlapping edits keep the earlier one.
fn splice(source: &str, mut edits: Vec<(Span, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for (span, replacement) in edits {
        let (start, end) = (span.start as usize, span.end as usize);
        if start < cursor {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&replacement);
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    out
}

struct EnvInliner<'ctx> {
    env: &'ctx BTreeMap<String, String>,
    edits: Vec<(Span, String)>,
}

impl<'a> Visit<'a> for EnvInliner<'_> {
    fn visit_static_member_expression(&mut self, expr: &StaticMemberExpression<'a>) {
        if let Some(name) = env_reference_name(expr) {
            let replacement = match self.env.get(name) {
                Some(value) => js_string(value),
                None => "undefined".to_string(),
            };
            self.edits.push((expr.span, replacement));
            return;
        }
        walk::walk_static_member_expression(self, expr);
    }
}

/// `process.env.NAME` -> `NAME`, for static member chains only.
fn env_reference_name<'a, 'b>(expr: &'b StaticMemberExpression<'a>) -> Option<&'b str> {
    let Expression::StaticMemberExpression(object) = &expr.object else {
        return None;
    };
    let Expression::Identifier(base) = &object.object else {
        return None;
    };
    if base.name == "process" && object.property.name == "env" {
        Some(expr.property.name.as_str())
    } else {
        None
    }
}

struct DebugCallStripper {
    edits: Vec<(Span, String)>,
}

impl<'a> Visit<'a> for DebugCallStripper {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if is_debug_log_call(call) {
            self.edits.push((call.span, "void 0".to_string()));
            return;
        }
        walk::walk_call_expression(self, call);
    }
}

fn is_debug_log_call(call: &CallExpression<'_>) -> bool {
    let Expression::StaticMemberExpression(member) = &call.callee else {
        return false;
    };
    let Expression::Identifier(object) = &member.object else {
        return false;
    };
    object.name == "console" && member.property.name == "log"
}

/// Rewrite top-level import/export declarations to CommonJS by span
/// splicing. Class declarations and every other statement are left
/// byte-for-byte intact.
fn lower_modules(source: &str, program: &Program<'_>) -> String {
    let mut edits: Vec<(Span, String)> = Vec::new();
    let mut appends: Vec<String> = Vec::new();
    let mut has_esm_exports = false;
    let mut temp = 0usize;

    for statement in &program.body {
        match statement {
            Statement::ImportDeclaration(decl) => {
                let request = js_string(decl.source.value.as_str());
                let replacement = match &decl.specifiers {
                    None => format!("require({request});"),
                    Some(specifiers) if specifiers.is_empty() => format!("require({request});"),
                    Some(specifiers) => {
                        let binding = format!("_bale${temp}");
                        temp += 1;
                        let mut out = format!("var {binding} = require({request});");
                        for specifier in specifiers {
                            match specifier {
                                ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                                    out.push_str(&format!(
                                        " var {local} = {binding} && {binding}.__esModule ? {binding}[\"default\"] : {binding};",
                                        local = spec.local.name,
                                    ));
                                }
                                ImportDeclarationSpecifier::ImportNamespaceSpecifier(namespace) => {
                                    out.push_str(&format!(
                                        " var {local} = {binding};",
                                        local = namespace.local.name,
                                    ));
                                }
                                ImportDeclarationSpecifier::ImportSpecifier(named) => {
                                    out.push_str(&format!(
                                        " var {local} = {binding}[{imported}];",
                                        local = named.local.name,
                                        imported = js_string(named.imported.name().as_str()),
                                    ));
                                }
                            }
                        }
                        out
                    }
                };
                edits.push((decl.span, replacement));
            }
            Statement::ExportNamedDeclaration(decl) => {
                has_esm_exports = true;
                if let Some(declaration) = &decl.declaration {
                    // `export const a = 1;` - drop the keyword, assign after.
                    edits.push((Span::new(decl.span.start, declaration.span().start), String::new()));
                    for name in declared_names(declaration) {
                        appends.push(format!("exports.{name} = {name};"));
                    }
                } else if let Some(from) = &decl.source {
                    let binding = format!("_bale${temp}");
                    temp += 1;
                    let mut out =
                        format!("var {binding} = require({});", js_string(from.value.as_str()));
                    for specifier in &decl.specifiers {
                        out.push_str(&format!(
                            " exports.{exported} = {binding}[{local}];",
                            exported = specifier.exported.name(),
                            local = js_string(specifier.local.name().as_str()),
                        ));
                    }
                    edits.push((decl.span, out));
                } else {
                    let mut out = String::new();
                    for specifier in &decl.specifiers {
                        out.push_str(&format!(
                            "exports.{exported} = {local}; ",
                            exported = specifier.exported.name(),
                            local = specifier.local.name(),
                        ));
                    }
                    edits.push((decl.span, out.trim_end().to_string()));
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                has_esm_exports = true;
                match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => match &func.id {
                        Some(id) => {
                            edits.push((Span::new(decl.span.start, func.span.start), String::new()));
                            appends.push(format!("exports[\"default\"] = {};", id.name));
                        }
                        None => edits.push((
                            Span::new(decl.span.start, func.span.start),
                            "exports[\"default\"] = ".to_string(),
                        )),
                    },
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => match &class.id {
                        Some(id) => {
                            edits.push((Span::new(decl.span.start, class.span.start), String::new()));
                            appends.push(format!("exports[\"default\"] = {};", id.name));
                        }
                        None => edits.push((
                            Span::new(decl.span.start, class.span.start),
                            "exports[\"default\"] = ".to_string(),
                        )),
                    },
                    other => {
                        let inner = other.span();
                        edits.push((
                            Span::new(decl.span.start, inner.start),
                            "exports[\"default\"] = ".to_string(),
                        ));
                    }
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                has_esm_exports = true;
                let binding = format!("_bale${temp}");
                temp += 1;
                edits.push((
                    decl.span,
                    format!(
                        "var {binding} = require({request}); for (var _bale$k in {binding}) exports[_bale$k] = {binding}[_bale$k];",
                        request = js_string(decl.source.value.as_str()),
                    ),
                ));
            }
            _ => {}
        }
    }

    let mut out = splice(source, edits);
    if has_esm_exports {
        out.insert_str(0, "exports.__esModule = true;\n");
    }
    for append in appends {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&append);
        out.push('\n');
    }
    out
}

fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .filter_map(|declarator| match &declarator.id.kind {
                BindingPatternKind::BindingIdentifier(id) => Some(id.name.to_string()),
                _ => None,
            })
            .collect(),
        Declaration::FunctionDeclaration(func) => {
            func.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx<'a>(env: &'a BTreeMap<String, String>, file: &'a Path) -> StageContext<'a> {
        StageContext {
            env,
            file,
            jsx: false,
        }
    }

    #[test]
    fn restrict_syntax_rejects_broken_source() {
        let env = BTreeMap::new();
        let file = PathBuf::from("bad.js");
        let err = Stage::RestrictSyntax
            .apply("var x = ;", &ctx(&env, &file))
            .unwrap_err();
        match err {
            BuildError::Syntax { file, message } => {
                assert!(file.contains("bad.js"));
                assert!(!message.is_empty());
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn inline_env_substitutes_known_values() {
        let mut env = BTreeMap::new();
        env.insert("TESTING_STRING".to_string(), "blablabla1234".to_string());
        let file = PathBuf::from("env.js");

        let out = Stage::InlineEnv
            .apply("console.log(process.env.TESTING_STRING);", &ctx(&env, &file))
            .unwrap();
        assert_eq!(out, "console.log(\"blablabla1234\");");
    }

    #[test]
    fn inline_env_uses_undefined_for_missing_values() {
        let env = BTreeMap::new();
        let file = PathBuf::from("env.js");

        let out = Stage::InlineEnv
            .apply("var v = process.env.NOT_SET;", &ctx(&env, &file))
            .unwrap();
        assert_eq!(out, "var v = undefined;");
    }

    #[test]
    fn strip_debug_calls_removes_console_log_only() {
        let env = BTreeMap::new();
        let file = PathBuf::from("dbg.js");

        let out = Stage::StripDebugCalls
            .apply(
                "console.log('gone');\nconsole.error('kept');",
                &ctx(&env, &file),
            )
            .unwrap();
        assert!(!out.contains("console.log"));
        assert!(out.contains("console.error"));
    }

    #[test]
    fn lower_modules_rewrites_imports_to_require() {
        let env = BTreeMap::new();
        let file = PathBuf::from("m.js");

        let out = Stage::LowerModules
            .apply("import helper from './helper';\nhelper();", &ctx(&env, &file))
            .unwrap();
        assert!(out.contains("require(\"./helper\")"));
        assert!(!out.contains("import "));
    }

    #[test]
    fn lower_modules_rewrites_exports() {
        let env = BTreeMap::new();
        let file = PathBuf::from("m.js");

        let out = Stage::LowerModules
            .apply("export default function run() {}\nexport const VALUE = 3;", &ctx(&env, &file))
            .unwrap();
        assert!(out.starts_with("exports.__esModule = true;"));
        assert!(out.contains("exports[\"default\"] = run;"));
        assert!(out.contains("exports.VALUE = VALUE;"));
        assert!(!out.contains("export "));
    }

    #[test]
    fn transpile_lowers_arrows_to_functions() {
        let env = BTreeMap::new();
        let file = PathBuf::from("a.js");

        let out = Stage::Transpile {
            target: true,
            jsx: false,
        }
        .apply("el.addEventListener('click', () => { fire(); });", &ctx(&env, &file))
        .unwrap();
        assert!(!out.contains("=>"), "arrow survived lowering: {out}");
        assert!(out.contains("function"));
    }

    #[test]
    fn transpile_preserves_class_declarations() {
        let env = BTreeMap::new();
        let file = PathBuf::from("c.js");

        let out = Stage::Transpile {
            target: true,
            jsx: false,
        }
        .apply("class Test {\n  constructor() {}\n}\nnew Test();", &ctx(&env, &file))
        .unwrap();
        assert!(out.contains("class Test"));
        assert!(!out.contains("function Test("));
    }

    #[test]
    fn transpile_rewrites_jsx_to_create_element() {
        let env = BTreeMap::new();
        let file = PathBuf::from("app.jsx");
        let ctx = StageContext {
            env: &env,
            file: &file,
            jsx: true,
        };

        let out = Stage::Transpile {
            target: false,
            jsx: true,
        }
        .apply("var el = <div className=\"x\">hi</div>;", &ctx)
        .unwrap();
        assert!(out.contains("React.createElement"));
        assert!(!out.contains("<div"));
    }

    #[test]
    fn minify_collapses_to_one_line() {
        let out = minify_source(
            "var a = 1;\n// comment\nvar b = a + 1;\n",
            &PathBuf::from("bundle.js"),
        )
        .unwrap();
        assert!(!out.contains('\n'));
        assert!(!out.contains("comment"));
    }

    #[test]
    fn plan_follows_the_configuration() {
        let options = crate::BuildOptions::new("a.js");
        let stages = plan(&options);
        assert_eq!(stages.first(), Some(&Stage::RestrictSyntax));
        assert!(stages.contains(&Stage::LowerModules));
        assert!(stages.contains(&Stage::Transpile {
            target: true,
            jsx: false
        }));
        assert!(!stages.contains(&Stage::StripDebugCalls));

        let minified = crate::BuildOptions::new("a.js").minify(true).modern_syntax(false);
        let stages = plan(&minified);
        assert!(stages.contains(&Stage::StripDebugCalls));
        assert!(!stages.iter().any(|s| matches!(s, Stage::Transpile { .. })));

        let react_only = crate::BuildOptions::new("a.js")
            .modern_syntax(false)
            .react(true);
        let stages = plan(&react_only);
        assert!(stages.contains(&Stage::Transpile {
            target: false,
            jsx: true
        }));
    }
}
