//! Preinstalled-package gatekeeping for install commands
//!
//! The execution environment ships with a fixed set of packages baked in, so
//! install commands naming only known packages are skipped instead of spawning
//! a redundant `pip install`. The skip policy is all-or-nothing per command:
//! one preinstalled package anywhere in the argument list skips the whole
//! command. This is an optimization against a fixed base image, not a
//! security check.

use std::collections::HashSet;

/// Package names assumed present in the base environment, lowercased.
const PREINSTALLED: &[&str] = &[
    "aiohappyeyeballs", "aiohttp", "aiosignal", "aiosqlite", "altgraph", "annotated", "anyio",
    "arrow", "asgiref", "asttokens", "async", "attrs", "bcrypt", "beautifulsoup4", "bidict",
    "binaryornot", "blinker", "boto3", "botocore", "bottle", "briefcase", "brotli", "build",
    "buildozer", "cachecontrol", "cachetools", "certifi", "cffi", "cfgv", "chardet", "charset",
    "click", "clr_loader", "colorama", "comtypes", "contourpy", "cookiecutter", "cryptography",
    "cssselect2", "cycler", "cython", "databases", "decorator", "deprecation", "diagrams",
    "diskcache", "distlib", "distro", "django", "dnspython", "docutils", "docx2pdf",
    "easyprocess", "ecdsa", "edge", "email_validator", "entrypoint2", "erd", "erdiagram",
    "exceptiongroup", "executing", "faiss", "faker", "fastapi", "filelock", "filetype", "fire",
    "firebase", "flask", "fonttools", "fpdf", "frozenlist", "fsspec", "geographiclib", "geopy",
    "gitdb", "gitpython", "google", "googleapis", "googlesearch", "gotrue", "gradio_client",
    "graphviz", "greenlet", "grpcio", "h11", "h2", "hpack", "httpcore", "httplib2", "httptools",
    "httpx", "huggingface", "hyperframe", "identify", "idna", "iniconfig", "ipython",
    "itsdangerous", "jedi", "jinja2", "jiter", "jmespath", "joblib", "jsonpickle", "kivy",
    "kivy_deps", "kivymd", "kiwisolver", "llama_cpp_python", "lxml", "markdown", "markupsafe",
    "matplotlib", "mdurl", "mouseinfo", "mpmath", "msgpack", "mss", "multidict", "mysqlclient",
    "networkx", "nodeenv", "numpy", "openai", "opencv", "openpyxl", "orjson", "packaging",
    "panda", "pandas", "parso", "passlib", "pdf2docx", "pdfkit", "pefile", "pexpect", "pillow",
    "pip", "platformdirs", "pluggy", "plyer", "portalocker", "postgrest", "pre_commit",
    "prompt_toolkit", "propcache", "proto", "protobuf", "proxy_tools", "psutil", "psycopg2",
    "ptyprocess", "pure_eval", "pyasn1", "pyasn1_modules", "pyautogui", "pycparser", "pydantic",
    "pydantic_core", "pydot", "pydub", "pydyf", "pygetwindow", "pygments", "pyinstaller",
    "pyjnius", "pyjwt", "pymongo", "pymsgbox", "pymupdf", "pyopengl", "pypandoc", "pyparsing",
    "pypdf2", "pyperclip", "pyphen", "pypiwin32", "pyproject_hooks", "pyqt5", "pyqt5_sip",
    "pyqtdeploy", "pyrect", "pyscreenshot", "pyscreeze", "pyside6", "pyside6_addons",
    "pyside6_essentials", "pysimplegui", "pyswisseph", "pytest", "python", "python-docx",
    "python-pptx", "pythonnet", "pytweening", "pytz", "pyvis", "pywebview", "pywin32", "pyyaml",
    "pyzbar", "qrcode", "qrcode[pil]", "razorpay", "realtime", "regex", "reportlab", "requests",
    "rich", "rsa", "s3transfer", "safetensors", "scikit", "scipy", "secrets", "sendgrid",
    "setuptools", "sh", "shellingham", "shiboken6", "simple", "six", "smmap", "sniffio",
    "soupsieve", "sqlalchemy", "sqlalchemy_schemadisplay", "sqlite3", "sqlparse", "srt",
    "stack", "starkbank", "starlette", "storage3", "strenum", "supabase", "supafunc", "sympy",
    "tabulate", "telegram", "termcolor", "text", "threadpoolctl", "tinycss2", "tinyhtml5", "tk",
    "toga", "tokenizers", "toml", "tomli", "tomli_w", "torch", "tqdm", "traitlets",
    "transformers", "travertino", "typer", "types", "typing_extensions", "tzdata", "ujson",
    "uritemplate", "urllib3", "uvicorn", "virtualenv", "watchfiles", "wcwidth", "weasyprint",
    "webencodings", "websockets", "werkzeug", "wheel", "wkhtmltopdf", "wsproto", "xlsxwriter",
    "yarl", "zopfli",
];

/// Version-pin operators stripped from requested package tokens.
const PIN_OPERATORS: &[&str] = &["==", ">=", "<=", "~=", "!=", "<", ">"];

pub struct PreinstalledPackages {
    names: HashSet<&'static str>,
}

impl PreinstalledPackages {
    pub fn new() -> Self {
        Self {
            names: PREINSTALLED.iter().copied().collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name.to_lowercase().as_str())
    }

    /// Returns the first requested package that is already preinstalled, if
    /// any. One hit is enough to skip the whole command.
    pub fn first_preinstalled(&self, requested: &[String]) -> Option<String> {
        requested.iter().find(|name| self.contains(name)).cloned()
    }
}

impl Default for PreinstalledPackages {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenizes an install command into shell arguments. Returns None when the
/// command is not valid shell (unbalanced quotes and the like).
pub fn tokenize_install(raw_command: &str) -> Option<Vec<String>> {
    shlex::split(raw_command)
}

/// True when the tokenized command is a `pip install` / `pip3 install`
/// invocation and nothing else.
pub fn is_pip_install(parts: &[String]) -> bool {
    if parts.len() < 2 {
        return false;
    }
    let head = parts[0].to_lowercase();
    (head == "pip" || head == "pip3") && parts[1].to_lowercase() == "install"
}

/// Bare package names requested by a tokenized `pip install` command, with
/// version pins stripped and lowercased. Flags are left in; a `--upgrade`
/// token never matches a package name, so it is harmless here.
pub fn requested_packages(parts: &[String]) -> Vec<String> {
    if parts.len() <= 2 {
        return Vec::new();
    }
    parts[2..]
        .iter()
        .map(|token| strip_version_pin(token).to_lowercase())
        .collect()
}

fn strip_version_pin(token: &str) -> &str {
    let mut bare = token;
    for op in PIN_OPERATORS {
        if let Some(index) = bare.find(op) {
            bare = &bare[..index];
        }
    }
    bare
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_case_insensitive() {
        let set = PreinstalledPackages::new();
        assert!(set.contains("numpy"));
        assert!(set.contains("NumPy"));
        assert!(set.contains("Flask"));
        assert!(!set.contains("definitely-not-a-real-package"));
    }

    #[test]
    fn test_tokenize_rejects_unbalanced_quotes() {
        assert!(tokenize_install("pip install 'broken").is_none());
        assert_eq!(
            tokenize_install("pip install requests").unwrap(),
            vec!["pip", "install", "requests"]
        );
    }

    #[test]
    fn test_is_pip_install() {
        let ok = tokenize_install("pip install requests").unwrap();
        assert!(is_pip_install(&ok));
        let ok3 = tokenize_install("pip3 install requests").unwrap();
        assert!(is_pip_install(&ok3));
        let not = tokenize_install("conda install requests").unwrap();
        assert!(!is_pip_install(&not));
        let uninstall = tokenize_install("pip uninstall requests").unwrap();
        assert!(!is_pip_install(&uninstall));
    }

    #[test]
    fn test_requested_packages_strip_pins() {
        let parts = tokenize_install("pip install NumPy==1.26.0 pandas>=2.0 scipy~=1.11").unwrap();
        assert_eq!(requested_packages(&parts), vec!["numpy", "pandas", "scipy"]);
    }

    #[test]
    fn test_requested_packages_empty_without_targets() {
        let parts = tokenize_install("pip install").unwrap();
        assert!(requested_packages(&parts).is_empty());
    }

    #[test]
    fn test_first_preinstalled_hit() {
        let set = PreinstalledPackages::new();
        let parts = tokenize_install("pip install some-new-thing requests").unwrap();
        let requested = requested_packages(&parts);
        assert_eq!(set.first_preinstalled(&requested), Some("requests".to_string()));
    }

    #[test]
    fn test_no_preinstalled_hit() {
        let set = PreinstalledPackages::new();
        let parts = tokenize_install("pip install some-new-thing").unwrap();
        let requested = requested_packages(&parts);
        assert_eq!(set.first_preinstalled(&requested), None);
    }
}
