// ============================================================
// Layer 4 — Dependency-Tree Renderer
// ============================================================
// Turns an externally parsed sentence into the bracketed token
// sequence the dataset files are made of. For "the cat sat":
//
//        sat
//         │ nsubj
//        cat
//         │ det
//        the
//
//   → [nsubj [det the ]det cat ]nsubj sat
//
// A token with no children renders as its text (or lemma).
// Otherwise every left child is wrapped in `[<rel>` … `]<rel>`,
// then the token itself, then the right children the same way.
// The root is the one token whose head is itself.
//
// Parser output is read in CoNLL-U form (10 tab separated
// columns, sentences separated by blank lines). Head 0 in that
// format marks the root and is mapped to the token itself.

use std::io::BufRead;

use crate::domain::error::DatasetError;

/// One token of a parsed sentence. `head` is a zero-based index
/// into the same sentence; the root points at itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DepToken {
    pub text:     String,
    pub lemma:    String,
    pub head:     usize,
    pub relation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSentence {
    tokens: Vec<DepToken>,
}

impl ParsedSentence {
    /// Every head must be in range and every head chain must end in a
    /// self-headed token; anything else is a Validation error.
    pub fn new(tokens: Vec<DepToken>) -> Result<Self, DatasetError> {
        let n = tokens.len();
        if let Some((i, t)) = tokens.iter().enumerate().find(|(_, t)| t.head >= n) {
            return Err(DatasetError::Validation(format!(
                "token {i} '{}' has head {} outside a sentence of {n} tokens",
                t.text, t.head
            )));
        }
        for start in 0..n {
            let mut at = start;
            let mut hops = 0;
            while tokens[at].head != at {
                at = tokens[at].head;
                hops += 1;
                if hops > n {
                    return Err(DatasetError::Validation(format!(
                        "head chain of token {start} '{}' forms a cycle",
                        tokens[start].text
                    )));
                }
            }
        }
        Ok(Self { tokens })
    }

    /// Index of the unique self-headed token.
    pub fn root(&self) -> Result<usize, DatasetError> {
        let mut roots = self.tokens.iter().enumerate().filter(|(i, t)| t.head == *i);
        match (roots.next(), roots.next()) {
            (Some((i, _)), None) => Ok(i),
            (None, _) => Err(DatasetError::Validation("sentence has no root token".into())),
            (Some(_), Some(_)) => Err(DatasetError::Validation(
                "sentence has more than one root token".into(),
            )),
        }
    }

    /// Children of `index` in sentence order (the root is not its own child)
    pub fn children(&self, index: usize) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(i, t)| t.head == index && *i != index)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn linearize(&self, lemmatize: bool) -> Result<Vec<String>, DatasetError> {
        let root = self.root()?;
        let mut out = Vec::with_capacity(self.tokens.len() * 3);
        self.render(root, lemmatize, &mut out);
        Ok(out)
    }

    fn render(&self, index: usize, lemmatize: bool, out: &mut Vec<String>) {
        let token = &self.tokens[index];
        let (lefts, rights): (Vec<usize>, Vec<usize>) =
            self.children(index).into_iter().partition(|&c| c < index);

        for child in lefts {
            self.render_wrapped(child, lemmatize, out);
        }
        out.push(if lemmatize { token.lemma.clone() } else { token.text.clone() });
        for child in rights {
            self.render_wrapped(child, lemmatize, out);
        }
    }

    fn render_wrapped(&self, child: usize, lemmatize: bool, out: &mut Vec<String>) {
        let rel = &self.tokens[child].relation;
        out.push(format!("[{rel}"));
        self.render(child, lemmatize, out);
        out.push(format!("]{rel}"));
    }
}

// ─── CoNLL-U reader ───────────────────────────────────────────────────────────

/// Read every sentence of a CoNLL-U stream.
pub fn read_conll<R: BufRead>(reader: R) -> Result<Vec<ParsedSentence>, DatasetError> {
    let mut sentences = Vec::new();
    let mut current: Vec<DepToken> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| DatasetError::resource("<conll input>", e))?;
        let line = line.trim_end();

        if line.is_empty() {
            if !current.is_empty() {
                sentences.push(ParsedSentence::new(std::mem::take(&mut current))?);
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 8 {
            return Err(DatasetError::Validation(format!(
                "line {}: expected 10 tab separated columns, found {}",
                line_no + 1,
                cols.len()
            )));
        }
        // Multi-word ranges (3-4) and empty nodes (3.1) carry no head
        if cols[0].contains('-') || cols[0].contains('.') {
            continue;
        }

        let bad = |what: &str| {
            DatasetError::Validation(format!("line {}: invalid {what}", line_no + 1))
        };
        let id: usize = cols[0].parse().map_err(|_| bad("token id"))?;
        let head: usize = cols[6].parse().map_err(|_| bad("head"))?;
        if id != current.len() + 1 {
            return Err(bad("token id order"));
        }

        current.push(DepToken {
            text:     cols[1].to_string(),
            lemma:    cols[2].to_string(),
            head:     if head == 0 { id - 1 } else { head - 1 },
            relation: cols[7].to_string(),
        });
    }
    if !current.is_empty() {
        sentences.push(ParsedSentence::new(current)?);
    }
    Ok(sentences)
}
