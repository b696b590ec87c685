//! Bootstrap script that the sandboxed interpreter runs instead of the
//! generated code. It owns the allow-lists; the generated code only ever
//! sees the namespace this script builds for it.
//!
//! Imports return read-only module views that refuse to hand out modules
//! outside the allow-list, and the source is rejected before it runs if it
//! names interpreter internals (underscore attributes, frames, code
//! objects). Both surface as `ImportFault`.

/// Fault kinds the harness writes to its report file
pub const REPORTED_KINDS: &[&str] = &["SyntaxFault", "ImportFault", "MemoryFault", "RuntimeFault"];

const HARNESS_TEMPLATE: &str = r#"import ast as _ast
import builtins as _builtins
import json as _json
import sys as _sys
import traceback as _traceback
import types as _types

_ALLOWED_MODULES = frozenset(__ALLOWED_MODULES__)
_ALLOWED_BUILTINS = __ALLOWED_BUILTINS__

# Plain-string dunders; everything else starting with "_" is interpreter internals
_PUBLIC_DUNDERS = frozenset(["__version__", "__name__", "__doc__", "__all__"])
_PUBLIC_STRINGS = _PUBLIC_DUNDERS | frozenset(["__main__"])

# Frame and code objects lead back to unrestricted globals
_INTERNAL_ATTRIBUTES = frozenset([
    "gi_frame", "gi_code", "gi_yieldfrom", "cr_frame", "cr_code", "cr_await",
    "ag_frame", "ag_code", "ag_await", "f_back", "f_globals", "f_locals",
    "f_builtins", "f_code", "tb_frame", "tb_next", "co_code", "mro",
])

# Callables that perform attribute lookup by string
_DENIED_MEMBERS = frozenset([
    ("operator", "attrgetter"),
    ("operator", "methodcaller"),
])


class _ImportDenied(ImportError):
    pass


def _is_internal(name):
    if name in _PUBLIC_DUNDERS:
        return False
    return name.startswith("_") or name in _INTERNAL_ATTRIBUTES


def _check_module(name):
    if name.split(".")[0] not in _ALLOWED_MODULES:
        raise _ImportDenied(
            "Import of module '%s' is not allowed. Only %s are permitted."
            % (name, sorted(_ALLOWED_MODULES))
        )


# Read-only view of an allowed module that never hands out other modules
class _ModuleView(object):
    __slots__ = ("_module",)

    def __init__(self, module):
        object.__setattr__(self, "_module", module)

    def __getattr__(self, name):
        module = object.__getattribute__(self, "_module")
        qualified = "%s.%s" % (module.__name__, name)
        if name == "__all__":
            # Star imports read this instead of the module dict
            public = [key for key in vars(module) if not key.startswith("_")]
            return list(getattr(module, "__all__", public))
        if name in _PUBLIC_DUNDERS:
            return getattr(module, name)
        if _is_internal(name) or (module.__name__.split(".")[0], name) in _DENIED_MEMBERS:
            raise _ImportDenied("Access to '%s' is not allowed." % qualified)
        try:
            value = getattr(module, name)
        except AttributeError:
            value = _sys.modules.get(qualified)
            if value is None:
                raise
        return _view(value)

    def __setattr__(self, name, value):
        raise _ImportDenied("Modules are read-only inside the sandbox.")

    def __delattr__(self, name):
        raise _ImportDenied("Modules are read-only inside the sandbox.")

    def __repr__(self):
        return "<module %r>" % object.__getattribute__(self, "_module").__name__


def _view(value):
    if isinstance(value, _types.ModuleType):
        _check_module(value.__name__)
        return _ModuleView(value)
    return value


def _safe_builtins():
    safe = {
        name: getattr(_builtins, name) for name in _ALLOWED_BUILTINS if hasattr(_builtins, name)
    }
    safe["__import__"] = _guarded_import
    return safe


def _harden_sympy():
    # sympify evaluates strings with every builtin function in scope
    try:
        _builtins.__import__("sympy.parsing.sympy_parser")
    except ImportError:
        return
    parser = _sys.modules["sympy.parsing.sympy_parser"]
    evaluate = getattr(parser, "eval_expr", None)
    if evaluate is None or getattr(parser, "_sandboxed", False):
        return

    def eval_expr(code, local_dict, global_dict):
        restricted = {
            name: value for name, value in global_dict.items()
            if not (name.startswith("_") or getattr(_builtins, name, None) is value)
        }
        restricted["__builtins__"] = _safe_builtins()
        return evaluate(code, local_dict, restricted)

    parser.eval_expr = eval_expr
    parser._sandboxed = True


def _guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    if level != 0:
        raise _ImportDenied("Relative imports are not allowed.")
    _check_module(name)
    module = _builtins.__import__(name, globals, locals, fromlist, level)
    if name.split(".")[0] == "sympy":
        _harden_sympy()
    return _view(module)


def _check_source(tree):
    for node in _ast.walk(tree):
        name = None
        if isinstance(node, _ast.Attribute):
            name = node.attr
        elif isinstance(node, _ast.Name) and node.id.startswith("__"):
            name = node.id
        elif isinstance(node, _ast.alias) and node.name.split(".")[-1].startswith("_"):
            name = node.name
        elif (
            isinstance(node, _ast.Constant)
            and isinstance(node.value, str)
            and "__" in node.value
            and node.value not in _PUBLIC_STRINGS
        ):
            raise _ImportDenied("String literals naming interpreter internals are not allowed.")
        if name is not None and _is_internal(name.split(".")[-1]):
            raise _ImportDenied("Access to '%s' is not allowed." % name)


def _report(fault_path, kind, exc):
    trace = _traceback.format_exc()
    _sys.stderr.write(trace)
    with open(fault_path, "w", encoding="utf-8") as fh:
        _json.dump(
            {"kind": kind, "type": type(exc).__name__, "message": str(exc), "trace": trace},
            fh,
        )


def _main(source_path, fault_path):
    with open(source_path, "r", encoding="utf-8") as fh:
        source = fh.read()

    try:
        tree = _ast.parse(source, "<verification>", "exec")
        code = compile(tree, "<verification>", "exec")
    except (SyntaxError, ValueError) as exc:
        _report(fault_path, "SyntaxFault", exc)
        return 3

    try:
        _check_source(tree)
    except ImportError as exc:
        _report(fault_path, "ImportFault", exc)
        return 4

    namespace = {"__builtins__": _safe_builtins(), "__name__": "__main__"}

    try:
        exec(code, namespace)
    except ImportError as exc:
        _report(fault_path, "ImportFault", exc)
        return 4
    except MemoryError as exc:
        _report(fault_path, "MemoryFault", exc)
        return 5
    except BaseException as exc:
        _report(fault_path, "RuntimeFault", exc)
        return 1
    finally:
        _sys.stdout.flush()
    return 0


if __name__ == "__main__":
    _sys.exit(_main(_sys.argv[1], _sys.argv[2]))
"#;

/// Render the harness with the given allow-lists baked in
pub fn render_harness(allowed_modules: &[String], allowed_builtins: &[String]) -> String {
    // A JSON array of strings is also a valid Python list literal
    let modules = serde_json::to_string(allowed_modules).unwrap_or_else(|_| "[]".to_string());
    let builtins = serde_json::to_string(allowed_builtins).unwrap_or_else(|_| "[]".to_string());

    HARNESS_TEMPLATE.replace("__ALLOWED_MODULES__", &modules).replace(
        "__ALLOWED_BUILTINS__",
        &builtins
    )
}
