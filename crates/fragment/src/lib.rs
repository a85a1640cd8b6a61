//! Incremental JSON fragment parser.
//!
//! Feeds arbitrarily sliced text chunks (typically a streaming tool-call
//! `functionArgs` buffer) through a small hand-rolled character-at-a-time
//! parser that emits one [`Update`] per structural event, in document order,
//! as soon as enough bytes are available to decide it. An instance is
//! restartable only across instances: create a fresh `FragmentParser` per
//! `toolCallId`, never reuse one across two different JSON values.

use agentcore_domain::fragment_kind::FragmentKind;
use agentcore_domain::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub path: String,
    pub kind: FragmentKind,
    pub text_value: Option<String>,
}

impl Update {
    fn new(path: impl Into<String>, kind: FragmentKind) -> Self {
        Self {
            path: path.into(),
            kind,
            text_value: None,
        }
    }

    fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_value = Some(text.into());
        self
    }
}

#[derive(Debug, Clone)]
enum Frame {
    Object,
    Array { next_index: usize },
}

/// What the lexer expects to see next. Object and array contexts are kept
/// distinct so a closing key lookup never gets confused with a value
/// position — the bug a naive single `ExpectKeyOrEnd` state falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// Top level, before anything has been read.
    ValueStart,
    /// Just opened `{`, or just consumed a `,` inside an object: a quoted
    /// key or (only in the just-opened case) `}` comes next.
    ObjectKeyOrEnd,
    /// A key's closing quote was just consumed: `:` comes next.
    ObjectColon,
    /// A key's `:` was just consumed: a value comes next.
    ObjectValue,
    /// A value inside an object just finished: `,` or `}` comes next.
    ObjectCommaOrEnd,
    /// Just opened `[`, or just consumed a `,` inside an array: a value
    /// comes next, or (only in the just-opened case) `]`.
    ArrayValueOrEnd,
    /// A value inside an array just finished: `,` or `]` comes next.
    ArrayCommaOrEnd,
    InString { for_key: bool, partial_emitted: bool },
    InNumber,
    InLiteral,
    Done,
}

pub struct FragmentParser {
    stack: Vec<Frame>,
    path_stack: Vec<String>,
    expect: Expect,
    token_buf: String,
    done: bool,
    errored: bool,
}

impl Default for FragmentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentParser {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            path_stack: Vec::new(),
            expect: Expect::ValueStart,
            token_buf: String::new(),
            done: false,
            errored: false,
        }
    }

    fn current_path(&self) -> String {
        self.path_stack.join(".")
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed the next slice of raw JSON text; returns every structural update
    /// this slice completes or begins. On the first ill-formed character this
    /// returns `Err` and all further calls become no-ops returning `Ok(vec![])` —
    /// callers fall back to the raw accumulated string per the tolerance policy.
    pub fn add_fragment(&mut self, chunk: &str) -> Result<Vec<Update>, Error> {
        if self.done || self.errored {
            return Ok(Vec::new());
        }
        let mut updates = Vec::new();
        for ch in chunk.chars() {
            if let Err(e) = self.step(ch, &mut updates) {
                self.errored = true;
                return Err(Error::Parser(e));
            }
            if self.done {
                break;
            }
        }
        Ok(updates)
    }

    fn step(&mut self, ch: char, updates: &mut Vec<Update>) -> Result<(), String> {
        match self.expect {
            Expect::ValueStart | Expect::ObjectValue | Expect::ArrayValueOrEnd => {
                self.step_value_position(ch, updates)
            }
            Expect::ObjectKeyOrEnd => self.step_object_key_or_end(ch, updates),
            Expect::ObjectColon => self.step_object_colon(ch),
            Expect::ObjectCommaOrEnd => self.step_object_comma_or_end(ch, updates),
            Expect::ArrayCommaOrEnd => self.step_array_comma_or_end(ch, updates),
            Expect::InString { .. } => self.step_in_string(ch, updates),
            Expect::InNumber => self.step_in_number(ch, updates),
            Expect::InLiteral => self.step_in_literal(ch, updates),
            Expect::Done => Ok(()),
        }
    }

    /// Dispatch a character that is allowed to start a value: top level,
    /// after `:` in an object, or at an array's value position. `]` is only
    /// legal here when the array was just opened (empty array), which the
    /// caller guarantees by only routing `ArrayValueOrEnd` here.
    fn step_value_position(&mut self, ch: char, updates: &mut Vec<Update>) -> Result<(), String> {
        if ch.is_whitespace() {
            return Ok(());
        }
        match ch {
            '{' => {
                updates.push(Update::new(self.current_path(), FragmentKind::StartObject));
                self.stack.push(Frame::Object);
                self.expect = Expect::ObjectKeyOrEnd;
            }
            '[' => {
                updates.push(Update::new(self.current_path(), FragmentKind::StartArray));
                self.stack.push(Frame::Array { next_index: 0 });
                self.path_stack.push("0".to_string());
                self.expect = Expect::ArrayValueOrEnd;
            }
            ']' if self.expect == Expect::ArrayValueOrEnd => {
                self.close_array(updates);
            }
            '"' => {
                self.token_buf.clear();
                self.expect = Expect::InString {
                    for_key: false,
                    partial_emitted: false,
                };
            }
            '-' | '0'..='9' => {
                self.token_buf.clear();
                self.token_buf.push(ch);
                self.expect = Expect::InNumber;
            }
            't' | 'f' | 'n' => {
                self.token_buf.clear();
                self.token_buf.push(ch);
                self.expect = Expect::InLiteral;
            }
            _ => return Err(format!("unexpected character '{}' at value position", ch)),
        }
        Ok(())
    }

    fn step_object_key_or_end(&mut self, ch: char, updates: &mut Vec<Update>) -> Result<(), String> {
        if ch.is_whitespace() {
            return Ok(());
        }
        match ch {
            '"' => {
                self.token_buf.clear();
                self.expect = Expect::InString {
                    for_key: true,
                    partial_emitted: false,
                };
            }
            '}' => self.close_object(updates),
            _ => return Err(format!("expected object key or '}}', got '{}'", ch)),
        }
        Ok(())
    }

    fn step_object_colon(&mut self, ch: char) -> Result<(), String> {
        if ch.is_whitespace() {
            return Ok(());
        }
        if ch == ':' {
            self.expect = Expect::ObjectValue;
            Ok(())
        } else {
            Err(format!("expected ':', got '{}'", ch))
        }
    }

    fn step_object_comma_or_end(&mut self, ch: char, updates: &mut Vec<Update>) -> Result<(), String> {
        if ch.is_whitespace() {
            return Ok(());
        }
        match ch {
            ',' => {
                self.expect = Expect::ObjectKeyOrEnd;
                Ok(())
            }
            '}' => {
                self.close_object(updates);
                Ok(())
            }
            _ => Err(format!("expected ',' or '}}', got '{}'", ch)),
        }
    }

    fn step_array_comma_or_end(&mut self, ch: char, updates: &mut Vec<Update>) -> Result<(), String> {
        if ch.is_whitespace() {
            return Ok(());
        }
        match ch {
            ',' => {
                self.expect = Expect::ArrayValueOrEnd;
                Ok(())
            }
            ']' => {
                self.close_array(updates);
                Ok(())
            }
            _ => Err(format!("expected ',' or ']', got '{}'", ch)),
        }
    }

    fn step_in_string(&mut self, ch: char, updates: &mut Vec<Update>) -> Result<(), String> {
        let (for_key, partial_emitted) = match self.expect {
            Expect::InString {
                for_key,
                partial_emitted,
            } => (for_key, partial_emitted),
            _ => unreachable!(),
        };
        match ch {
            '"' => {
                if for_key {
                    let key = self.token_buf.clone();
                    self.path_stack.push(key);
                    updates.push(Update::new(self.current_path(), FragmentKind::Key));
                    self.expect = Expect::ObjectColon;
                } else {
                    updates.push(
                        Update::new(self.current_path(), FragmentKind::CompleteString)
                            .with_text(self.token_buf.clone()),
                    );
                    self.finish_value(updates);
                }
            }
            '\\' => {
                // Best-effort: treat the escaped character literally. Full
                // \uXXXX decoding is not required by the tolerance contract.
                self.token_buf.push(ch);
            }
            _ => {
                self.token_buf.push(ch);
                if !for_key {
                    updates.push(
                        Update::new(self.current_path(), FragmentKind::PartialString)
                            .with_text(ch.to_string()),
                    );
                    if !partial_emitted {
                        self.expect = Expect::InString {
                            for_key: false,
                            partial_emitted: true,
                        };
                    }
                }
            }
        }
        Ok(())
    }

    fn step_in_number(&mut self, ch: char, updates: &mut Vec<Update>) -> Result<(), String> {
        if matches!(ch, '0'..='9' | '.' | 'e' | 'E' | '+' | '-') {
            self.token_buf.push(ch);
            return Ok(());
        }
        updates.push(
            Update::new(self.current_path(), FragmentKind::CompleteNumber)
                .with_text(self.token_buf.clone()),
        );
        self.finish_value(updates);
        self.step(ch, updates)
    }

    fn step_in_literal(&mut self, ch: char, updates: &mut Vec<Update>) -> Result<(), String> {
        if ch.is_alphabetic() {
            self.token_buf.push(ch);
            return Ok(());
        }
        let kind = match self.token_buf.as_str() {
            "true" | "false" => FragmentKind::CompleteBoolean,
            "null" => FragmentKind::CompleteNull,
            other => return Err(format!("unrecognized literal '{}'", other)),
        };
        updates.push(Update::new(self.current_path(), kind).with_text(self.token_buf.clone()));
        self.finish_value(updates);
        self.step(ch, updates)
    }

    /// Called right after a scalar (string/number/bool/null) value completes.
    /// Transitions `expect` based on the enclosing container, and advances
    /// the enclosing array's index / pops the enclosing object's key.
    fn finish_value(&mut self, _updates: &mut [Update]) {
        match self.stack.last_mut() {
            Some(Frame::Object) => {
                self.path_stack.pop();
                self.expect = Expect::ObjectCommaOrEnd;
            }
            Some(Frame::Array { next_index }) => {
                *next_index += 1;
                if let Some(last) = self.path_stack.last_mut() {
                    *last = next_index.to_string();
                }
                self.expect = Expect::ArrayCommaOrEnd;
            }
            None => {
                self.expect = Expect::Done;
                self.done = true;
            }
        }
    }

    fn close_object(&mut self, updates: &mut Vec<Update>) {
        let path = self.current_path();
        self.stack.pop();
        updates.push(Update::new(path, FragmentKind::EndObject));
        self.finish_container_value(updates);
    }

    fn close_array(&mut self, updates: &mut Vec<Update>) {
        self.path_stack.pop();
        let path = self.current_path();
        self.stack.pop();
        updates.push(Update::new(path, FragmentKind::EndArray));
        self.finish_container_value(updates);
    }

    /// Same as `finish_value` but for the container that just closed — its
    /// own key/index (if any) still needs popping/advancing in the parent.
    fn finish_container_value(&mut self, updates: &mut Vec<Update>) {
        self.finish_value(updates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_whole(json: &str) -> Vec<Update> {
        let mut parser = FragmentParser::new();
        parser.add_fragment(json).unwrap()
    }

    fn parse_byte_at_a_time(json: &str) -> Vec<Update> {
        let mut parser = FragmentParser::new();
        let mut updates = Vec::new();
        for ch in json.chars() {
            updates.extend(parser.add_fragment(&ch.to_string()).unwrap());
        }
        updates
    }

    fn collapse_partial_strings(updates: Vec<Update>) -> Vec<Update> {
        let mut out: Vec<Update> = Vec::new();
        for u in updates {
            if u.kind == FragmentKind::PartialString {
                if let Some(last) = out.last_mut() {
                    if last.kind == FragmentKind::PartialString && last.path == u.path {
                        let mut merged = last.text_value.clone().unwrap_or_default();
                        merged.push_str(u.text_value.as_deref().unwrap_or_default());
                        last.text_value = Some(merged);
                        continue;
                    }
                }
            }
            out.push(u);
        }
        out
    }

    #[test]
    fn flat_object_emits_start_key_value_end() {
        let updates = parse_whole(r#"{"city":"SF"}"#);
        assert_eq!(updates[0].kind, FragmentKind::StartObject);
        assert_eq!(updates[1].kind, FragmentKind::Key);
        assert_eq!(updates[1].path, "city");
        assert!(updates
            .iter()
            .any(|u| u.kind == FragmentKind::CompleteString && u.path == "city"));
        assert_eq!(updates.last().unwrap().kind, FragmentKind::EndObject);
    }

    #[test]
    fn nested_object_paths_are_dotted() {
        let updates = parse_whole(r#"{"location":{"city":"SF"}}"#);
        let key_update = updates
            .iter()
            .find(|u| u.kind == FragmentKind::Key && u.path == "location.city")
            .expect("nested key path");
        assert_eq!(key_update.path, "location.city");
    }

    #[test]
    fn array_elements_use_numeric_index_paths() {
        let updates = parse_whole(r#"["a","b"]"#);
        let strings: Vec<_> = updates
            .iter()
            .filter(|u| u.kind == FragmentKind::CompleteString)
            .collect();
        assert_eq!(strings[0].path, "0");
        assert_eq!(strings[1].path, "1");
    }

    #[test]
    fn numbers_and_booleans_and_null_are_recognized() {
        let updates = parse_whole(r#"{"n":42,"b":true,"z":null}"#);
        assert!(updates
            .iter()
            .any(|u| u.kind == FragmentKind::CompleteNumber && u.text_value.as_deref() == Some("42")));
        assert!(updates
            .iter()
            .any(|u| u.kind == FragmentKind::CompleteBoolean && u.text_value.as_deref() == Some("true")));
        assert!(updates
            .iter()
            .any(|u| u.kind == FragmentKind::CompleteNull));
    }

    #[test]
    fn partial_string_slices_concatenate_to_full_value() {
        let mut parser = FragmentParser::new();
        let mut updates = Vec::new();
        for chunk in ["{\"text\":\"hel", "lo wor", "ld\"}"] {
            updates.extend(parser.add_fragment(chunk).unwrap());
        }
        let joined: String = updates
            .iter()
            .filter(|u| u.kind == FragmentKind::PartialString)
            .filter_map(|u| u.text_value.clone())
            .collect();
        assert_eq!(joined, "hello world");
        assert!(updates
            .iter()
            .any(|u| u.kind == FragmentKind::CompleteString && u.text_value.as_deref() == Some("hello world")));
    }

    #[test]
    fn byte_at_a_time_matches_whole_input_modulo_partial_string_bursts() {
        let json = r#"{"a":{"b":[1,2,"three"],"c":false}}"#;
        let whole = collapse_partial_strings(parse_whole(json));
        let sliced = collapse_partial_strings(parse_byte_at_a_time(json));
        assert_eq!(whole, sliced);
    }

    #[test]
    fn ill_formed_json_surfaces_as_parser_error() {
        let mut parser = FragmentParser::new();
        let err = parser.add_fragment("{\"a\": @}").unwrap_err();
        assert!(matches!(err, Error::Parser(_)));
    }

    #[test]
    fn marks_done_after_top_level_value_closes() {
        let mut parser = FragmentParser::new();
        parser.add_fragment(r#"{"a":1}"#).unwrap();
        assert!(parser.is_done());
    }
}
