//! Prompt construction for plan generation.

/// Goal used when the caller does not supply one.
pub const DEFAULT_GOAL: &str = "Plan an announcement of this year's technical company events. \
First I want to write down the ideas and brainstorm. Then sync with my team lead, and next \
with the architecture and cloud departments. Afterwards I would like to present it to the CTO \
and get approval, and budget. Once everything is approved I want to announce it in the wiki, \
in Teams, and at a few events so our people are aware.";

/// Output contract given to the model.
const OUTPUT_CONTRACT: &str = r#"## Output format

Respond with a single JSON object and nothing else:

```json
{
  "bucketname": "2024 Technical Events Announcement Plan",
  "tasklist": [
    { "task": "1. Annotate initial ideas for the announcement" },
    { "task": "2. Brainstorm additional ideas and refine them" }
  ]
}
```

- `bucketname`: a short, clear, descriptive name grouping all the tasks.
- `tasklist`: the tasks in the order they should be done. Each entry has a
  single `task` key whose value is short text starting with its position
  number (`"1. ..."`, `"2. ..."`).
- The JSON must be valid and well formed. Do not add commentary, headings,
  or any text outside the JSON object.
"#;

/// Build the prompt asking the model to break `goal` into ordered tasks.
pub fn build_plan_prompt(goal: &str) -> String {
    let mut prompt = String::with_capacity(OUTPUT_CONTRACT.len() + goal.len() + 256);
    prompt.push_str(
        "Plan the tasks needed to accomplish the following goal, in the order \
         they should be done.\n\n",
    );
    prompt.push_str("## Goal\n\n");
    prompt.push_str(goal.trim());
    prompt.push_str("\n\n");
    prompt.push_str(OUTPUT_CONTRACT);
    prompt
}
