/////////////////////////////TESTS////////////////////////////////////////////////////
/*
tests of the task document parser:
titles and keys
typed values and quoted strings
sections and whole documents
typed accessors and error reporting
file based parsing and path resolution
*/

#[cfg(test)]
mod tests {
    use crate::Utils::task_parser::{
        TaskDocument, Value, filter_comments, parse_document, parse_key, parse_key_value_pair,
        parse_section, parse_title, parse_value, parse_value_list,
    };
    use crate::errors::BenchError;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_parse_title() {
        let (remaining, title) = parse_title("noise\n magnitudes: 0").unwrap();
        assert_eq!(title, "noise");
        assert_eq!(remaining, "magnitudes: 0");

        let (remaining, title) = parse_title("lotka_volterra2 key: v").unwrap();
        assert_eq!(title, "lotka_volterra2");
        assert_eq!(remaining, "key: v");

        // titles cannot start with a digit
        assert!(parse_title("0_1 key: v").is_err());
    }

    #[test]
    fn test_parse_key_with_factor_codes() {
        let (remaining, key) = parse_key("0_11: d^2u/dx2^2").unwrap();
        assert_eq!(key, "0_11");
        assert_eq!(remaining, ": d^2u/dx2^2");

        let (_, key) = parse_key("train_max: 150").unwrap();
        assert_eq!(key, "train_max");
    }

    #[test]
    fn test_parse_value() {
        let (remaining, value) = parse_value("du/dx1, next").unwrap();
        assert_eq!(value, Value::String("du/dx1".to_string()));
        assert_eq!(remaining, ", next");

        let (_, value) = parse_value("150 next").unwrap();
        assert_eq!(value, Value::Integer(150));

        let (_, value) = parse_value("2.5e-2").unwrap();
        assert_eq!(value, Value::Float(0.025));

        let (_, value) = parse_value("false").unwrap();
        assert_eq!(value, Value::Boolean(false));

        let (remaining, value) =
            parse_value("\"20.0 * u{power: 1.0} + 0.0 = du/dx1{power: 1.0}\" rest").unwrap();
        assert_eq!(
            value,
            Value::String("20.0 * u{power: 1.0} + 0.0 = du/dx1{power: 1.0}".to_string())
        );
        assert_eq!(remaining, " rest");
    }

    #[test]
    fn test_parse_value_list() {
        let (remaining, values) = parse_value_list("0, 0.005,\n 0.01 seed: 1").unwrap();
        assert_eq!(
            values,
            vec![Value::Integer(0), Value::Float(0.005), Value::Float(0.01)]
        );
        assert_eq!(remaining, " seed: 1");
    }

    #[test]
    fn test_parse_key_value_pair_empty_value() {
        let (remaining, (key, values)) = parse_key_value_pair("thresholds:\nrun: true").unwrap();
        assert_eq!(key, "thresholds");
        assert!(values.is_empty());
        assert_eq!(remaining, "\nrun: true");
    }

    #[test]
    fn test_parse_section() {
        let (remaining, (title, section)) =
            parse_section("epde run: true launches: 10\n complexity: 2.5, 2.5\nsindy run: false")
                .unwrap();
        assert_eq!(title, "epde");
        assert_eq!(section.get("run"), Some(&vec![Value::Boolean(true)]));
        assert_eq!(section.get("launches"), Some(&vec![Value::Integer(10)]));
        assert_eq!(
            section.get("complexity"),
            Some(&vec![Value::Float(2.5), Value::Float(2.5)])
        );
        assert_eq!(remaining, "sindy run: false");
    }

    #[test]
    fn test_parse_document_merges_sections() {
        let (remaining, doc) =
            parse_document("noise seed: 1\nepde run: true\nnoise magnitudes: 0, 0.1").unwrap();
        assert!(remaining.trim().is_empty());
        let noise = doc.get("noise").unwrap();
        assert_eq!(noise.len(), 2);
        assert!(doc.contains_key("epde"));
    }

    #[test]
    fn test_filter_comments() {
        let filtered = filter_comments("# header\nnoise seed: 1\n// c\n% matlab style\n\nepde run: true");
        assert_eq!(filtered, "noise seed: 1\nepde run: true");
    }

    #[test]
    fn test_task_accessors() {
        let task = TaskDocument::parse(
            "experiment kind: lotka_volterra name: \"LV benchmark\"
             data train_max: 150 values_file: data/data_20.csv
             noise magnitudes: 0, 0.005, 0.01 seed: 7
             epde run: true complexity: 2.5, 2.5",
        )
        .unwrap();
        assert_eq!(task.get_str("experiment", "name").unwrap(), "LV benchmark");
        assert_eq!(task.get_usize("data", "train_max").unwrap(), 150);
        assert_eq!(task.get_u64("noise", "seed").unwrap(), 7);
        assert!(task.get_bool("epde", "run").unwrap());
        assert_eq!(task.get_f64_list("epde", "complexity").unwrap(), vec![2.5, 2.5]);
        assert_eq!(
            task.get_path("data", "values_file").unwrap(),
            PathBuf::from(".").join("data/data_20.csv")
        );
        assert_eq!(task.opt_bool("sindy", "run").unwrap(), None);
        assert_eq!(task.opt_f64("noise", "seed").unwrap(), Some(7.0));
    }

    #[test]
    fn test_task_accessor_errors() {
        let task = TaskDocument::parse("epde run: yes launches: -3 complexity: 1, 2").unwrap();
        assert!(matches!(
            task.get_bool("epde", "run"),
            Err(BenchError::InvalidTaskValue { .. })
        ));
        assert!(matches!(
            task.get_usize("epde", "launches"),
            Err(BenchError::InvalidTaskValue { .. })
        ));
        // a list where a single value is expected
        assert!(matches!(
            task.get_f64("epde", "complexity"),
            Err(BenchError::InvalidTaskValue { .. })
        ));
        assert!(matches!(
            task.get_str("sindy", "run"),
            Err(BenchError::MissingTaskField { .. })
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(TaskDocument::parse("just_a_title").is_err());
        assert!(TaskDocument::parse("").is_err());
    }

    #[test]
    fn test_task_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lv.task");
        std::fs::write(
            &path,
            "# Lotka-Volterra\ndata time_file: t.csv\noutput log: logs/lv.json\n",
        )
        .unwrap();
        let task = TaskDocument::from_file(&path).unwrap();
        assert_eq!(task.get_path("data", "time_file").unwrap(), dir.path().join("t.csv"));
        assert_eq!(
            task.get_path("output", "log").unwrap(),
            dir.path().join("logs/lv.json")
        );

        let missing = dir.path().join("absent.task");
        assert!(matches!(
            TaskDocument::from_file(&missing),
            Err(BenchError::DataFileNotFound(p)) if p == missing
        ));
    }
}
