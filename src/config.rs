//! Loading encoder configurations from structured documents or directive files.
//!
//! Both entry points resolve each encoder name to `http.encoders.<name>` through the
//! registry, populate the module, provision it, and return the ready-to-use modules.
//!
//! Structured form:
//!
//! ```json
//! { "encodings": { "zstd": { "level": "best", "window_size": 262144 } } }
//! ```
//!
//! Directive form, either as an `encode` block, inline names, or a bare directive:
//!
//! ```text
//! encode {
//!     zstd best 256KiB
//! }
//! encode zstd
//! zstd fastest
//! ```

use serde::Deserialize;
use tracing::debug;

use crate::{
    directive::Dispenser,
    encode::{EncodingModule, Provisioner, UnmarshalDirective},
    error::EncodeError,
    registry::{ModuleInfo, get_module},
};

/// Registry namespace of encoding modules.
pub const ENCODERS_NAMESPACE: &str = "http.encoders";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EncodeDocument {
    #[serde(default)]
    encodings: serde_json::Map<String, serde_json::Value>,
}

fn lookup(name: &str) -> Result<ModuleInfo, EncodeError> {
    let id = format!("{ENCODERS_NAMESPACE}.{name}");
    get_module(&id).ok_or(EncodeError::UnknownModule(id))
}

/// Loads the encoders of a structured document, ordered by encoding name.
pub fn load_json(input: &str) -> Result<Vec<EncodingModule>, EncodeError> {
    let doc: EncodeDocument = serde_json::from_str(input)?;
    doc.encodings
        .into_iter()
        .map(|(name, raw)| {
            let info = lookup(&name)?;
            let mut module = (info.new)();
            module.decode_json(raw)?;
            module.provision()?;
            debug!(id = info.id, "encoder loaded from json");
            Ok(module)
        })
        .collect()
}

/// Loads the encoders declared in a directive file, in declaration order.
pub fn load_directives(file: &str, input: &str) -> Result<Vec<EncodingModule>, EncodeError> {
    let mut d = Dispenser::tokenize(file, input);
    let mut modules = Vec::new();
    while d.next() {
        match d.val() {
            "encode" => parse_encode(&mut d, &mut modules)?,
            "{" | "}" => return Err(d.errf(format!("unexpected '{}'", d.val()))),
            _ => modules.push(parse_encoder(&mut d)?),
        }
    }
    Ok(modules)
}

/// `encode [<name>...] [{ <encoder directives> }]`
fn parse_encode(d: &mut Dispenser, modules: &mut Vec<EncodingModule>) -> Result<(), EncodeError> {
    while d.next_arg() {
        let info = lookup(d.val()).map_err(|e| d.err(e))?;
        let mut module = (info.new)();
        module.provision().map_err(|e| d.err(e))?;
        modules.push(module);
    }

    if d.peek() != Some("{") {
        return Ok(());
    }
    d.next();
    loop {
        if !d.next() {
            return Err(d.errf("unexpected end of input, expected '}'"));
        }
        match d.val() {
            "}" => return Ok(()),
            "{" => return Err(d.errf("unexpected '{'")),
            _ => modules.push(parse_encoder(d)?),
        }
    }
}

/// One encoder directive starting at the current token.
fn parse_encoder(d: &mut Dispenser) -> Result<EncodingModule, EncodeError> {
    let info = lookup(d.val()).map_err(|e| d.err(e))?;
    let mut segment = d.segment();
    let mut module = (info.new)();
    module.unmarshal_directive(&mut segment)?;
    module.provision().map_err(|e| segment.err(e))?;
    debug!(id = info.id, line = segment.line(), "encoder loaded from directive");
    Ok(module)
}
