//! Problem and sample-case records

use serde::{Deserialize, Serialize};

/// One sample input/output pair. Both sides are newline-normalized (trailing
/// newline enforced) when the problem is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

/// A problem as stored locally. The judge is referenced by display name only;
/// it is resolved against the provider registry when the record is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    #[serde(default)]
    pub contest_id: String,
    pub name: String,
    pub url: String,
    pub judge: String,
    pub cases: Vec<TestCase>,
}

impl Problem {
    /// Multi-line human-readable description used by the `view` command.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("id:         {}\n", self.id));
        out.push_str(&format!("name:       {}\n", self.name));
        out.push_str(&format!("contest_id: {}\n", self.contest_id));
        out.push_str(&format!("url:        {}\n", self.url));
        out.push_str(&format!("judge:      {}\n", self.judge));
        for (i, case) in self.cases.iter().enumerate() {
            out.push_str(&format!("==== sample case {} ====\n", i + 1));
            out.push_str("---- input ----\n");
            out.push_str(&case.input);
            out.push_str("---- output ----\n");
            out.push_str(&case.output);
        }
        out
    }
}
