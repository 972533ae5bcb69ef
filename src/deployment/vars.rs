use minijinja::Environment;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

#[derive(Debug, serde::Deserialize, Clone)]
#[serde(tag = "source", rename_all = "snake_case")]
enum VarSource {
    Env {
        name: String,
        #[serde(default)]
        default: Option<String>,
    },
}

#[derive(Debug, serde::Deserialize, Clone)]
#[serde(untagged)]
enum VarEntry {
    Raw(String),
    Source(VarSource),
}

#[derive(Debug, Default, Clone)]
pub struct DeploymentVars {
    inner: HashMap<String, VarEntry>,
}

impl<'de> Deserialize<'de> for DeploymentVars {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let inner = HashMap::deserialize(deserializer)?;
        Ok(Self { inner })
    }
}

impl DeploymentVars {
    pub fn materialize(self) -> Result<DeploymentVarsMaterialized, DeploymentConfigError> {
        let mut inner = HashMap::new();
        for (key, entry) in self.inner {
            let value = match entry {
                VarEntry::Raw(s) => s,
                VarEntry::Source(VarSource::Env { name, default }) => {
                    match (std::env::var(&name), default) {
                        (Ok(value), _) => value,
                        (Err(_), Some(default)) => {
                            log::debug!("{name} is not set, using default for {key}");
                            default
                        }
                        (Err(_), None) => return Err(DeploymentConfigError::MissingEnv(name)),
                    }
                }
            };
            inner.insert(key, value);
        }
        Ok(DeploymentVarsMaterialized { inner })
    }
}

#[derive(Debug, Default, Clone)]
pub struct DeploymentVarsMaterialized {
    inner: HashMap<String, String>,
}

impl DeploymentVarsMaterialized {
    pub fn try_init(config: &Path) -> Result<Self, DeploymentConfigError> {
        DeploymentVars::try_init(config)?.materialize()
    }
}

impl Serialize for DeploymentVarsMaterialized {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.inner.serialize(serializer)
    }
}

/// Files next to the deployment file that match ironstack.vars | *.ironstack.vars
/// Sorted
fn list_vars_files(config: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let search_dir = config.parent().map_or(Path::new("."), |p| {
        if p.as_os_str().is_empty() {
            Path::new(".")
        } else {
            p
        }
    });
    if let Ok(entries) = std::fs::read_dir(search_dir) {
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() {
                if let Some(file_name) = path.file_name().and_then(|s| s.to_str()) {
                    if file_name == "ironstack.vars" || file_name.ends_with(".ironstack.vars") {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    files
}

impl DeploymentVars {
    fn try_init_from_string(val: &str) -> Result<Self, DeploymentConfigError> {
        Ok(toml::from_str(val)?)
    }

    /// Later files override earlier ones.
    fn combine(vars: Vec<Self>) -> Self {
        let mut combined_inner = HashMap::new();
        vars.into_iter().for_each(|var_set| {
            combined_inner.extend(var_set.inner);
        });
        Self {
            inner: combined_inner,
        }
    }

    fn try_init(config: &Path) -> Result<Self, DeploymentConfigError> {
        let mut vars = Vec::new();
        for vars_file in list_vars_files(config) {
            log::debug!("Reading vars from {vars_file:?}");
            let content = std::fs::read_to_string(&vars_file)?;
            vars.push(Self::try_init_from_string(&content)?);
        }

        Ok(Self::combine(vars))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeploymentConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Templating error: {0:?}")]
    Template((PathBuf, minijinja::Error)),
    #[error("Environment variable {0} is not set")]
    MissingEnv(String),
    /// The rendered deployment is not valid TOML. Carries no source text,
    /// rendered files may hold secret values.
    #[error("Unable to parse {path:?} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("Invalid deployment: {0}")]
    Invalid(String),
}

/// Escapes `value` for the inside of a TOML basic string.
fn toml_escape(value: &str) -> String {
    // JSON string escapes are a subset of the TOML basic string ones,
    // except that TOML also wants DEL escaped
    let quoted = serde_json::Value::from(value).to_string();
    quoted[1..quoted.len() - 1].replace('\u{7f}', "\\u007F")
}

/// Renders a deployment template. Every `${ }` expression is written
/// escaped for a double-quoted TOML string, so values may hold quotes,
/// backslashes and newlines.
pub fn render_template(
    template_str: &str,
    vars: &DeploymentVarsMaterialized,
) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();

    let syntax = minijinja::syntax::SyntaxConfig::builder()
        .variable_delimiters("${", "}")
        .build()?;

    env.set_syntax(syntax);
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    env.set_formatter(|out, _state, value| {
        out.write_str(&toml_escape(&value.to_string()))?;
        Ok(())
    });

    let template = env.template_from_str(template_str)?;
    template.render(vars)
}
