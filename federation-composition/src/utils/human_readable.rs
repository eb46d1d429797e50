use itertools::Itertools;

/// Joins quoted items as prose: `"A"`, `"A" and "B"`, `"A", "B" and "C"`.
pub(crate) fn join_quoted<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted = items
        .into_iter()
        .map(|item| format!("\"{}\"", item.as_ref()))
        .collect::<Vec<_>>();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {last}", rest.iter().join(", ")),
    }
}

/// `subgraph "A"` or `subgraphs "A", "B" and "C"`.
pub(crate) fn human_readable_subgraph_names<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names = names.into_iter().collect::<Vec<_>>();
    let prefix = if names.len() == 1 { "subgraph" } else { "subgraphs" };
    format!("{prefix} {}", join_quoted(names))
}

/// Describes how a value differs across subgraphs, grouping subgraphs that agree:
/// `it has type "Int" in subgraph "A" but type "String" in subgraphs "B" and "C"`.
///
/// `values` pairs a subgraph name with the already formatted value, in subgraph order.
pub(crate) fn describe_mismatch(label: &str, values: &[(&str, String)]) -> String {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for (subgraph, value) in values {
        match groups.iter_mut().find(|(existing, _)| *existing == value.as_str()) {
            Some((_, subgraphs)) => subgraphs.push(*subgraph),
            None => groups.push((value.as_str(), vec![*subgraph])),
        }
    }
    groups
        .iter()
        .enumerate()
        .map(|(i, (value, subgraphs))| {
            let lead = match i {
                0 => "it has",
                _ if i == groups.len() - 1 && i > 1 => "and",
                _ => "but",
            };
            format!(
                "{lead} {label} {value} in {}",
                human_readable_subgraph_names(subgraphs)
            )
        })
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subgraph_lists() {
        assert_eq!(human_readable_subgraph_names(["a"]), "subgraph \"a\"");
        assert_eq!(
            human_readable_subgraph_names(["a", "b"]),
            "subgraphs \"a\" and \"b\""
        );
        assert_eq!(
            human_readable_subgraph_names(vec!["a".to_string(), "b".into(), "c".into()]),
            "subgraphs \"a\", \"b\" and \"c\""
        );
    }

    #[test]
    fn mismatches_group_agreeing_subgraphs() {
        let values = [
            ("a", "\"Int\"".to_string()),
            ("b", "\"String\"".to_string()),
            ("c", "\"Int\"".to_string()),
        ];
        assert_eq!(
            describe_mismatch("type", &values),
            "it has type \"Int\" in subgraphs \"a\" and \"c\" but type \"String\" in subgraph \"b\""
        );
    }
}
