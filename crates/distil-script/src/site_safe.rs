//! Mode B: site-safe script generation, for interpreters that already have code
//! installed in site-packages (spec §4.7 "Mode B (site-safe)"). Writes a rewritten
//! `site` module and a `sitecustomize` alongside it, and launchers that disable site
//! initialization and import the rewritten module manually.

use std::path::{Path, PathBuf};

use distil_distribution::WorkingSet;
use distil_interpreter::InterpreterInfo;
use distil_normalize::ProjectKey;

use crate::path::{format_paths, join_path_entries};
use crate::write::{shebang_executable, write_script};
use crate::ScriptError;

const ADDSITEPACKAGES_MARKER: &str = "def addsitepackages(";
const ENABLEUSERSITE_MARKER: &str = "ENABLE_USER_SITE = ";

/// Write `sitecustomize.py` into `site_py_dest`: the caller's initialization snippet,
/// optionally followed by the interpreter's own `sitecustomize` module so user code
/// that expects it to run still sees it execute.
pub fn generate_sitecustomize(
    site_py_dest: &Path,
    interpreter: &InterpreterInfo,
    initialization: &str,
    exec_sitecustomize: bool,
) -> Result<PathBuf, ScriptError> {
    let path = site_py_dest.join("sitecustomize.py");
    let mut contents = String::new();
    if !initialization.is_empty() {
        contents.push_str(initialization);
        contents.push('\n');
    }
    if exec_sitecustomize {
        if let Some(real_path) = interpreter.module_file("sitecustomize")? {
            let real_contents = fs_err::read_to_string(&real_path)?;
            contents.push_str(&format!("\n# The following is from\n# {}\n", real_path.display()));
            contents.push_str(&real_contents);
        }
    }
    fs_err::create_dir_all(site_py_dest)?;
    write_script(&path, &contents)
}

/// Write a rewritten copy of the interpreter's own `site` module into `site_py_dest`,
/// prepending the working set's paths (and, if requested, the interpreter's original
/// site-packages directories) to what `addsitepackages` adds.
pub fn generate_site(
    site_py_dest: &Path,
    working_set: &WorkingSet,
    interpreter: &InterpreterInfo,
    extra_paths: &[PathBuf],
    include_site_packages: bool,
    packaging_support_project: Option<&ProjectKey>,
    relative_root: Option<&Path>,
) -> Result<PathBuf, ScriptError> {
    let site_path = site_py_dest.join("site.py");
    let path = crate::path::working_set_path(working_set, extra_paths);
    let formatted = format_paths(&path, &site_path, relative_root);

    let mut preamble = match &formatted.relative_setup {
        Some(setup) => setup
            .lines()
            .map(|line| if line.is_empty() { String::new() } else { format!("    {line}") })
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    };
    let egg_path_string = join_path_entries(&formatted.entries, 2);

    let mut original_path_setup = String::new();
    if include_site_packages {
        let site_paths: Vec<String> = interpreter
            .site_paths()
            .iter()
            .map(|p| format!("{:?}", p.to_string_lossy()))
            .collect();
        original_path_setup = format!(
            "\n    original_paths = [\n        {}\n        ]\n    for path in original_paths:\n        addsitedir(path, known_paths)",
            join_path_entries(&site_paths, 2)
        );

        if let Some(packaging_support_project) = packaging_support_project {
            if let Some(dist) = working_set.get(packaging_support_project) {
                if let Some(location) = dist.location.path() {
                    let location_literal = format!("{:?}", location.to_string_lossy());
                    preamble.push_str(&format!(
                        "\n    setuptools_path = {location_literal}\n    sys.path.append(setuptools_path)\n    known_paths.add(os.path.normcase(setuptools_path))\n    import pkg_resources"
                    ));
                    original_path_setup = format!(
                        "\n            pkg_resources.working_set.add_entry(sitedir){original_path_setup}"
                    );
                }
            }
        }
    }

    let addsitepackages_script = format!(
        "def addsitepackages(known_paths):\n    \"\"\"Add site packages, as determined by distil.\n\n    See original_addsitepackages, below, for the original version.\"\"\"{preamble}\n    buildout_paths = [\n        {egg_path_string}\n        ]\n    for path in buildout_paths:\n        sitedir, sitedircase = makepath(path)\n        if not sitedircase in known_paths and os.path.exists(sitedir):\n            sys.path.append(sitedir)\n            known_paths.add(sitedircase){original_path_setup}\n    return known_paths\n\ndef original_addsitepackages("
    );

    let real_site_path = interpreter
        .module_file("site")?
        .ok_or_else(|| ScriptError::SiteModuleNotFound(interpreter.executable().to_path_buf()))?;
    let real_site = fs_err::read_to_string(&real_site_path)?;

    let mut rewritten = String::new();
    let mut successful_rewrite = false;
    for line in real_site.split_inclusive('\n') {
        if line.starts_with(ENABLEUSERSITE_MARKER) {
            rewritten.push_str(ENABLEUSERSITE_MARKER);
            rewritten.push_str("False # distil does not support user sites.\n");
        } else if line.starts_with(ADDSITEPACKAGES_MARKER) {
            rewritten.push_str(&addsitepackages_script);
            rewritten.push_str(&line[ADDSITEPACKAGES_MARKER.len()..]);
            successful_rewrite = true;
        } else {
            rewritten.push_str(line);
        }
    }

    if !successful_rewrite {
        return Err(ScriptError::SiteRewriteFailed);
    }

    fs_err::create_dir_all(site_py_dest)?;
    write_script(&site_path, &rewritten)
}

/// Write an interpreter launcher that execs the real interpreter with `PYTHONPATH`
/// extended to carry `site_py_dest` (the Mode B equivalent of `_generate_interpreter`,
/// since the rewritten `site` module needs to be importable before site init runs).
pub fn generate_interpreter_launcher(
    name: &str,
    dest: &Path,
    executable: &Path,
    site_py_dest: &Path,
) -> Result<PathBuf, ScriptError> {
    let script_path = dest.join(name);
    let site_py_dest_literal = format!("{:?}", site_py_dest.to_string_lossy());
    let contents = format!(
        "#!{shebang} -S\n\nimport os\nimport sys\n\nargv = [sys.executable] + sys.argv[1:]\nenviron = os.environ.copy()\npath = {site_py_dest_literal}\nif environ.get('PYTHONPATH'):\n    path = os.pathsep.join([path, environ['PYTHONPATH']])\nenviron['PYTHONPATH'] = path\nos.execve(sys.executable, argv, environ)\n",
        shebang = shebang_executable(executable),
    );
    write_script(&script_path, &contents)
}
