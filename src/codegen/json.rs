//! JSON dump of the linked tree, for tooling that wants the schema as data.

use crate::error::GenerationError;
use crate::types::LinkedFile;

use super::{output_path, Backend, OutputSink};

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBackend;

impl Backend for JsonBackend {
    fn name(&self) -> &str {
        "json"
    }

    fn emit(&self, file: &LinkedFile, parameter: &str, sink: &mut OutputSink) -> Result<(), GenerationError> {
        let text = match parameter {
            "" | "pretty" => serde_json::to_string_pretty(&file.to_proto()),
            "compact" => serde_json::to_string(&file.to_proto()),
            other => {
                return Err(GenerationError::InvalidParameter {
                    target: self.name().to_string(),
                    parameter: other.to_string(),
                })
            }
        }
        .map_err(|e| GenerationError::Failed {
            target: self.name().to_string(),
            message: e.to_string(),
        })?;
        sink.write(output_path(file.name(), "json"), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::{DefaultLinker, SchemaLinker};
    use crate::parser;
    use crate::parser::ast::{FileDescriptor, OptionValue};

    #[test]
    fn test_json_reads_back() {
        let file = DefaultLinker
            .link(
                parser::parse("dir/m.proto", r#"syntax = "proto3"; package p; message M { int32 a = 1; }"#).unwrap(),
                &[],
            )
            .unwrap();
        let mut sink = OutputSink::new();
        JsonBackend.emit(&file, "compact", &mut sink).unwrap();
        let out = sink.into_map();
        let text = out.get("dir/m.json").unwrap();
        let back: FileDescriptor = serde_json::from_str(text).unwrap();
        assert_eq!(&back, file.descriptor());
    }

    #[test]
    fn test_non_finite_option_values_read_back() {
        let source = r#"syntax = "proto3";
            option (upper) = inf;
            option (lower) = -inf;
            option (missing) = nan;
            option (ratio) = 0.5;"#;
        let file = DefaultLinker.link(parser::parse("f.proto", source).unwrap(), &[]).unwrap();
        let mut sink = OutputSink::new();
        JsonBackend.emit(&file, "compact", &mut sink).unwrap();
        let out = sink.into_map();
        let text = out.get("f.json").unwrap();
        assert!(text.contains(r#""float":"inf""#));
        assert!(text.contains(r#""float":"-inf""#));
        assert!(text.contains(r#""float":"nan""#));
        assert!(text.contains(r#""float":0.5"#));

        let back: FileDescriptor = serde_json::from_str(text).unwrap();
        let float = |name: &str| match back.options.get(name) {
            Some(OptionValue::Float(v)) => *v,
            other => panic!("expected a float for {name}, got {other:?}"),
        };
        assert_eq!(float("(upper)"), f64::INFINITY);
        assert_eq!(float("(lower)"), f64::NEG_INFINITY);
        assert!(float("(missing)").is_nan());
        assert_eq!(float("(ratio)"), 0.5);
    }
}
