//! Variables de entorno declaradas por el usuario en un único campo de texto
//! (`A=1 B=dos palabras C=3`) y entorno efectivo del proceso externo.
use indexmap::IndexMap;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w+=").unwrap_or_else(|e| panic!("invalid key regex: {e}")))
}

fn next_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\w+=").unwrap_or_else(|e| panic!("invalid key regex: {e}")))
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Asignaciones `nombre=valor` en orden de primera declaración; un nombre
/// repetido conserva su posición y toma el último valor.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EnvOverlay {
    vars: IndexMap<String, String>,
}

impl EnvOverlay {
    /// Tokeniza como `\b\w+=.*?(?=\s*\w+=|$)`: el valor llega hasta el
    /// siguiente `palabra=` y se recorta por la derecha. El texto que no forma
    /// un token se ignora (sólo se avisa en el log).
    pub fn parse(text: &str) -> Self {
        let mut vars = IndexMap::new();
        let mut skipped = String::new();
        let mut pos = 0;

        while pos < text.len() {
            match token_at(text, pos) {
                Some((name_end, value_end)) => {
                    let name = &text[pos..name_end - 1];
                    let value = text[name_end..value_end].trim_end();
                    vars.insert(name.to_string(), value.to_string());
                    pos = value_end;
                }
                None => {
                    let step = text[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
                    skipped.push_str(&text[pos..pos + step]);
                    pos += step;
                }
            }
        }

        let skipped = skipped.trim();
        if !skipped.is_empty() {
            log::warn!("ignoring malformed environment text: '{skipped}'");
        }
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Intenta un token en `pos`. Devuelve (fin de `nombre=`, fin del valor).
fn token_at(text: &str, pos: usize) -> Option<(usize, usize)> {
    // \b: el carácter previo no puede ser de palabra
    if text[..pos].chars().next_back().is_some_and(is_word) {
        return None;
    }
    let name_end = pos + key_re().find(&text[pos..])?.end();
    let mut p = name_end;
    loop {
        let rest = &text[p..];
        // $ también casa justo antes de un '\n' final
        if rest.is_empty() || rest == "\n" || next_key_re().is_match(rest) {
            return Some((name_end, p));
        }
        let c = rest.chars().next()?;
        if c == '\n' {
            return None;
        }
        p += c.len_utf8();
    }
}

/// Entorno que recibe el proceso: el ambiente más el overlay (`inherit`) o
/// sólo el overlay. Nunca modifica el entorno del propio proceso.
pub fn effective_environment<I>(ambient: I, overlay: &EnvOverlay, inherit: bool) -> BTreeMap<String, String>
    where I: IntoIterator<Item = (String, String)>
{
    let mut env: BTreeMap<String, String> = if inherit { ambient.into_iter().collect() } else { BTreeMap::new() };
    for (k, v) in overlay.iter() {
        env.insert(k.to_string(), v.to_string());
    }
    env
}
