//! Call context: arguments, keyword arguments and the caller.

use core::panic::Location;

use crate::{
    redact::{self, RedactionPolicy},
    value::Kwargs,
};

/// Report entries describing one call.
///
/// `args` are the positional arguments, already summarized before the target
/// consumed them. Keyword values are rendered here, with sensitive names
/// filtered. A `caller_function` passed as a keyword argument wins over the
/// one found on the stack.
pub fn extract(
    args: &[String],
    kwargs: &Kwargs,
    policy: &RedactionPolicy,
    caller: Option<&'static Location<'static>>,
    caller_function: Option<&str>,
) -> Vec<(String, String)> {
    let mut entries = Vec::with_capacity(args.len() + kwargs.len() + 3);

    for (index, summary) in args.iter().enumerate() {
        let key = format!("arg_{index}");
        let value = policy.apply(&key, summary);
        entries.push((key, value));
    }

    for (key, value) in kwargs {
        let rendered = policy.render(key, value, redact::KWARGS_LIMIT);
        entries.push((key.clone(), rendered));
    }

    if let Some(caller) = caller {
        entries.push(("caller_filename".to_string(), caller.file().to_string()));
        entries.push(("caller_line_number".to_string(), caller.line().to_string()));
    }
    if let Some(function) = caller_function
        && !kwargs.contains_key("caller_function")
    {
        entries.push(("caller_function".to_string(), function.to_string()));
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ContextValue;

    #[test]
    fn test_sensitive_keys_are_filtered() {
        let kwargs = Kwargs::new()
            .with("password", "hunter2")
            .with("_session", "abc")
            .with("user", "ada")
            .with("note", "n".repeat(150));
        let entries = extract(&[], &kwargs, &RedactionPolicy::default(), None, None);
        assert_eq!(entries[0], ("password".into(), redact::FILTERED.into()));
        assert_eq!(entries[1], ("_session".into(), redact::FILTERED.into()));
        assert_eq!(entries[2], ("user".into(), "ada".into()));
        assert_eq!(entries[3].1.chars().count(), redact::KWARGS_LIMIT + 3);
    }

    #[test]
    fn test_arguments_and_caller() {
        let args = vec!["10".to_string(), "0".to_string()];
        let kwargs = Kwargs::new().with("ids", ContextValue::debug([1, 2]));
        let caller = Location::caller();
        let entries = extract(
            &args,
            &kwargs,
            &RedactionPolicy::default(),
            Some(caller),
            Some("checkout"),
        );
        let keys: Vec<_> = entries.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "arg_0",
                "arg_1",
                "ids",
                "caller_filename",
                "caller_line_number",
                "caller_function"
            ]
        );
        assert_eq!(entries[2].1, "[1, 2]");
        assert_eq!(entries[4].1, caller.line().to_string());
        assert_eq!(entries[5].1, "checkout");
    }

    #[test]
    fn test_explicit_caller_function_wins() {
        let kwargs = Kwargs::new().with("caller_function", "cron_job");
        let entries = extract(&[], &kwargs, &RedactionPolicy::default(), None, Some("run"));
        assert_eq!(entries, [("caller_function".to_string(), "cron_job".to_string())]);
    }
}
