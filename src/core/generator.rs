use std::collections::BTreeMap;

use async_trait::async_trait;
use tera::Tera;

use crate::error::Result;

/// Context handed to the generator alongside the raw file content.
///
/// Everything the generator needs travels in explicit values; there is no
/// process-wide generation session.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    /// Functions in this file whose bodies changed (same-file updates)
    pub changed_functions: Vec<String>,

    /// Functions in this file affected by a dependency change (cascades)
    pub affected_functions: Vec<String>,

    /// Function name -> transitive callees, for callee-aware documentation
    pub related_functions: BTreeMap<String, Vec<String>>,

    /// Previous artifact text, when one exists
    pub previous_artifact: Option<String>,
}

/// The artifact-generation collaborator.
///
/// Opaque to the orchestrator: whether the implementation renders a
/// template, calls an LLM, or runs a compiler pass, the contract is one
/// fallible async call per file. Generation failures are per-file
/// recoverable - the orchestrator logs them and moves on.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(
        &self,
        file_path: &str,
        content: &str,
        context: &GenerationContext,
    ) -> Result<String>;

    /// Human-readable generator name for logs
    fn name(&self) -> &str;
}

const ARTIFACT_TEMPLATE: &str = r#"---
source: {{ file_path }}
generated: {{ generated_at }}
---

# {{ file_path }}

{% if affected_functions %}Regenerated because dependencies of {% for f in affected_functions %}`{{ f }}`{% if not loop.last %}, {% endif %}{% endfor %} changed.

{% endif %}{% if changed_functions %}Updated functions: {% for f in changed_functions %}`{{ f }}`{% if not loop.last %}, {% endif %}{% endfor %}.

{% endif %}## Functions

{% for name, callees in related_functions %}### {{ name }}

{% if callees %}Calls: {% for callee in callees %}`{{ callee }}`{% if not loop.last %}, {% endif %}{% endfor %}
{% else %}No project-internal calls.
{% endif %}
{% endfor %}## Source

```python
{{ source }}
```
"#;

/// Default generator: renders a Markdown artifact from a built-in Tera
/// template. Deterministic, offline, and good enough to keep artifact
/// plumbing honest end to end.
pub struct TemplateGenerator {
    tera: Tera,
}

impl TemplateGenerator {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template("artifact.md", ARTIFACT_TEMPLATE)?;
        Ok(Self { tera })
    }
}

#[async_trait]
impl ArtifactGenerator for TemplateGenerator {
    async fn generate(
        &self,
        file_path: &str,
        content: &str,
        context: &GenerationContext,
    ) -> Result<String> {
        let mut ctx = tera::Context::new();
        ctx.insert("file_path", file_path);
        ctx.insert("source", content);
        ctx.insert("generated_at", &chrono::Utc::now().to_rfc3339());
        ctx.insert("changed_functions", &context.changed_functions);
        ctx.insert("affected_functions", &context.affected_functions);
        ctx.insert("related_functions", &context.related_functions);

        Ok(self.tera.render("artifact.md", &ctx)?)
    }

    fn name(&self) -> &str {
        "template"
    }
}
