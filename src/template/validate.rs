//! Reference validation for a composed template
//!
//! Every intrinsic function in resources and outputs is checked against the
//! declarations of the template that contains it. Cross-document imports can
//! only be checked for well-formedness here; see `exports` for the
//! namespace-level check.

use super::declaration::DeclarationKind;
use super::document::Template;
use super::error::ComposeError;
use super::value::{is_pseudo_parameter, Intrinsic, Value};

/// Checks references of one declaration against its template
pub(crate) struct ReferenceChecker<'a> {
    template: &'a Template,
    owner: &'a str,
}

impl<'a> ReferenceChecker<'a> {
    pub(crate) fn new(template: &'a Template, owner: &'a str) -> Self {
        Self { template, owner }
    }

    /// Validate every intrinsic inside a value
    pub(crate) fn check_value(&self, value: &Value) -> Result<(), ComposeError> {
        for f in value.intrinsics() {
            self.check_intrinsic(f)?;
        }
        Ok(())
    }

    fn check_intrinsic(&self, f: &Intrinsic) -> Result<(), ComposeError> {
        match f {
            Intrinsic::Ref(id) => self.check_ref(id),
            Intrinsic::GetAtt {
                resource,
                attribute,
            } => self.check_get_att(resource, attribute),
            Intrinsic::FindInMap {
                map,
                top_key,
                second_key,
            } => self.check_find_in_map(map, top_key, second_key),
            Intrinsic::If { condition, .. } => self.check_condition(condition),
            Intrinsic::Sub {
                template,
                variables,
            } => {
                for name in sub_variables(self.owner, template)? {
                    if variables.contains_key(name) {
                        continue;
                    }
                    match name.split_once('.') {
                        Some((resource, attribute)) if !is_pseudo_parameter(name) => {
                            self.check_get_att(resource, attribute)?
                        }
                        _ => self.check_ref(name)?,
                    }
                }
                Ok(())
            }
            Intrinsic::ImportValue(name) => self.check_import(name),
            Intrinsic::Join { .. }
            | Intrinsic::Select { .. }
            | Intrinsic::Split { .. }
            | Intrinsic::Base64(_)
            | Intrinsic::GetAZs(_) => Ok(()),
        }
    }

    /// Every `Fn::If` in a value names an already declared condition
    pub(crate) fn check_condition_uses(&self, value: &Value) -> Result<(), ComposeError> {
        for f in value.intrinsics() {
            if let Intrinsic::If { condition, .. } = f {
                self.check_condition(condition)?;
            }
        }
        Ok(())
    }

    /// `Ref` resolves to a parameter, a resource or a pseudo parameter
    pub(crate) fn check_ref(&self, id: &str) -> Result<(), ComposeError> {
        if is_pseudo_parameter(id) {
            return Ok(());
        }
        match self.template.kind_of(id) {
            Some(DeclarationKind::Parameter) | Some(DeclarationKind::Resource) => Ok(()),
            Some(other) => Err(ComposeError::invalid_reference(
                id,
                self.owner,
                other,
                "a parameter or resource",
            )),
            None => Err(ComposeError::undefined(
                id,
                self.owner,
                find_similar(self.template.referable_ids(), id, 2),
            )),
        }
    }

    fn check_get_att(&self, resource: &str, attribute: &str) -> Result<(), ComposeError> {
        if attribute.is_empty() {
            return Err(ComposeError::malformed(
                self.owner,
                "Fn::GetAtt",
                format!("no attribute given for '{resource}'"),
            ));
        }
        match self.template.kind_of(resource) {
            Some(DeclarationKind::Resource) => {}
            Some(other) => {
                return Err(ComposeError::invalid_reference(
                    resource,
                    self.owner,
                    other,
                    "a resource",
                ))
            }
            None => {
                return Err(ComposeError::undefined(
                    resource,
                    self.owner,
                    find_similar(self.template.resource_ids(), resource, 2),
                ))
            }
        }
        if let (Some(child), Some(output)) = (
            self.template.child_interface(resource),
            attribute.strip_prefix("Outputs."),
        ) {
            if !child.has_output(output) {
                return Err(ComposeError::nested(
                    resource,
                    format!("child template has no output '{output}' (read by '{}')", self.owner),
                ));
            }
        }
        Ok(())
    }

    fn check_find_in_map(
        &self,
        map: &str,
        top_key: &Value,
        second_key: &Value,
    ) -> Result<(), ComposeError> {
        let mapping = match self.template.mapping(map) {
            Some(m) => m,
            None => {
                return Err(match self.template.kind_of(map) {
                    Some(other) => {
                        ComposeError::invalid_reference(map, self.owner, other, "a mapping")
                    }
                    None => ComposeError::undefined(
                        map,
                        self.owner,
                        find_similar(self.template.mapping_ids(), map, 2),
                    ),
                })
            }
        };
        // literal keys can be resolved now; computed keys are left to the provisioner
        if let Some(top) = top_key.as_str() {
            let Some(inner) = mapping.entries.get(top) else {
                return Err(ComposeError::malformed(
                    self.owner,
                    "Fn::FindInMap",
                    format!("mapping '{map}' has no key '{top}'"),
                ));
            };
            if let Some(second) = second_key.as_str() {
                if !inner.contains_key(second) {
                    return Err(ComposeError::malformed(
                        self.owner,
                        "Fn::FindInMap",
                        format!("mapping '{map}' has no key '{top}.{second}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn check_condition(&self, name: &str) -> Result<(), ComposeError> {
        if self.template.condition(name).is_some() {
            return Ok(());
        }
        Err(ComposeError::undefined_condition(
            name,
            self.owner,
            find_similar(self.template.condition_ids(), name, 2),
        ))
    }

    /// Operands of `Fn::Equals` may only read parameters and mappings
    pub(crate) fn check_condition_operand(&self, value: &Value) -> Result<(), ComposeError> {
        for f in value.intrinsics() {
            match f {
                Intrinsic::Ref(id) if is_pseudo_parameter(id) => {}
                Intrinsic::Ref(id) => match self.template.kind_of(id) {
                    Some(DeclarationKind::Parameter) => {}
                    Some(other) => {
                        return Err(ComposeError::invalid_reference(
                            id,
                            self.owner,
                            other,
                            "a parameter",
                        ))
                    }
                    None => {
                        return Err(ComposeError::undefined(
                            id,
                            self.owner,
                            find_similar(self.template.parameter_ids(), id, 2),
                        ))
                    }
                },
                Intrinsic::FindInMap {
                    map,
                    top_key,
                    second_key,
                } => self.check_find_in_map(map, top_key, second_key)?,
                other => {
                    return Err(ComposeError::expression(
                        self.owner,
                        format!("{} cannot be used inside a condition", other.function_name()),
                    ))
                }
            }
        }
        Ok(())
    }

    /// `DependsOn` targets are resources of the same template
    pub(crate) fn check_depends_on(&self, target: &str) -> Result<(), ComposeError> {
        match self.template.kind_of(target) {
            Some(DeclarationKind::Resource) => Ok(()),
            Some(other) => Err(ComposeError::invalid_reference(
                target,
                self.owner,
                other,
                "a resource",
            )),
            None => Err(ComposeError::undefined(
                target,
                self.owner,
                find_similar(self.template.resource_ids(), target, 2),
            )),
        }
    }

    fn check_import(&self, name: &Value) -> Result<(), ComposeError> {
        match name {
            Value::String(s) if is_export_name(s) => Ok(()),
            Value::Intrinsic(_) => Ok(()),
            other => Err(ComposeError::InvalidImportName {
                name: other
                    .literal_text()
                    .unwrap_or_else(|| other.to_json().to_string()),
                referenced_by: self.owner.to_string(),
            }),
        }
    }
}

/// Export names are non-empty and limited to alphanumerics, `-` and `:`
pub fn is_export_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':')
}

/// Variable names referenced by an `Fn::Sub` template string
///
/// `${!Literal}` is an escape for a literal `${Literal}` and yields nothing.
pub fn sub_variables<'t>(owner: &str, template: &'t str) -> Result<Vec<&'t str>, ComposeError> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            ComposeError::malformed(owner, "Fn::Sub", "unterminated '${' placeholder")
        })?;
        let name = after[..end].trim();
        if !name.starts_with('!') {
            if name.is_empty() {
                return Err(ComposeError::malformed(owner, "Fn::Sub", "empty '${}' placeholder"));
            }
            names.push(name);
        }
        rest = &after[end + 1..];
    }
    Ok(names)
}

/// Compute Levenshtein edit distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let n = b_chars.len();

    if a_chars.is_empty() {
        return n;
    }
    if n == 0 {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];
    for (i, ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// Find declared IDs within a maximum edit distance of a missing one
pub(crate) fn find_similar<'a>(
    defined: impl Iterator<Item = &'a str>,
    target: &str,
    max_distance: usize,
) -> Vec<String> {
    let mut candidates: Vec<(&str, usize)> = defined
        .filter_map(|name| {
            let dist = levenshtein_distance(name, target);
            (dist <= max_distance && dist > 0).then_some((name, dist))
        })
        .collect();

    candidates.sort_by_key(|(_, d)| *d);
    candidates
        .into_iter()
        .map(|(name, _)| name.to_string())
        .take(3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("Subnet", "Subnet"), 0);
        assert_eq!(levenshtein_distance("Subnet", "Subnt"), 1);
        assert_eq!(levenshtein_distance("VPC", "DB"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
    }

    #[test]
    fn test_find_similar() {
        let ids = ["SecurityGroup", "Subnet", "Bastion"];
        let suggestions = find_similar(ids.iter().copied(), "SecurityGrop", 2);
        assert_eq!(suggestions, vec!["SecurityGroup".to_string()]);
    }

    #[test]
    fn test_sub_variables() {
        let vars = sub_variables(
            "X",
            "https://${QSS3BucketName}.${QSS3Region}.amazonaws.com/${QSS3KeyPrefix}x.yaml",
        )
        .unwrap();
        assert_eq!(vars, vec!["QSS3BucketName", "QSS3Region", "QSS3KeyPrefix"]);
    }

    #[test]
    fn test_sub_variables_skips_escapes() {
        let vars = sub_variables("X", "echo ${!HOME} ${AWS::Region}").unwrap();
        assert_eq!(vars, vec!["AWS::Region"]);
    }

    #[test]
    fn test_sub_variables_unterminated() {
        assert!(sub_variables("X", "broken ${Name").is_err());
    }

    #[test]
    fn test_export_names() {
        assert!(is_export_name("ATL-VPCID"));
        assert!(is_export_name("stack:VPC-1"));
        assert!(!is_export_name(""));
        assert!(!is_export_name("ATL VPCID"));
        assert!(!is_export_name("ATL_VPCID"));
    }
}
