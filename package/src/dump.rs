//! Textual form of a [`Document`], as stored in `graph.nnef`.
use std::io::Write;

use crate::ast::*;
use crate::internal::*;

pub struct Dumper<'a> {
    w: &'a mut dyn Write,
}

impl<'a> Dumper<'a> {
    pub fn new(w: &'a mut dyn Write) -> Dumper<'a> {
        Dumper { w }
    }

    pub fn document(&mut self, document: &Document) -> ConvoyResult<()> {
        writeln!(self.w, "version {};", document.version)?;
        for ext in &document.extensions {
            writeln!(self.w, "extension {};", ext.join(" "))?;
        }
        writeln!(self.w)?;
        self.graph_def(&document.graph_def)?;
        Ok(())
    }

    fn graph_def(&mut self, def: &GraphDef) -> ConvoyResult<()> {
        write!(self.w, "graph {}( ", def.id)?;
        self.identifiers(&def.parameters)?;
        write!(self.w, " ) -> ( ")?;
        self.identifiers(&def.results)?;
        writeln!(self.w, " )\n{{")?;
        for assignment in &def.body {
            self.assignment(assignment)?;
        }
        writeln!(self.w, "}}")?;
        Ok(())
    }

    fn identifiers(&mut self, ids: &[String]) -> ConvoyResult<()> {
        for (ix, id) in ids.iter().enumerate() {
            if ix > 0 {
                write!(self.w, ", ")?;
            }
            write!(self.w, "{id}")?;
        }
        Ok(())
    }

    fn assignment(&mut self, assignment: &Assignment) -> ConvoyResult<()> {
        write!(self.w, "  ")?;
        self.lvalue(&assignment.left)?;
        write!(self.w, " = ")?;
        self.rvalue(&assignment.right)?;
        writeln!(self.w, ";")?;
        Ok(())
    }

    fn lvalue(&mut self, left: &LValue) -> ConvoyResult<()> {
        match left {
            LValue::Identifier(s) => write!(self.w, "{s}")?,
            LValue::Tuple(items) => {
                write!(self.w, "( ")?;
                for (ix, item) in items.iter().enumerate() {
                    if ix > 0 {
                        write!(self.w, ", ")?;
                    }
                    self.lvalue(item)?;
                }
                write!(self.w, " )")?;
            }
        }
        Ok(())
    }

    pub fn rvalue(&mut self, rv: &RValue) -> ConvoyResult<()> {
        match rv {
            RValue::Identifier(id) => write!(self.w, "{id}")?,
            RValue::Literal(lit) => self.literal(lit)?,
            RValue::Array(items) => self.sequence("[", items, "]")?,
            RValue::Tuple(items) => self.sequence("(", items, ")")?,
            RValue::Invocation(inv) => self.invocation(inv)?,
        }
        Ok(())
    }

    fn sequence(&mut self, open: &str, items: &[RValue], close: &str) -> ConvoyResult<()> {
        write!(self.w, "{open}")?;
        for (ix, item) in items.iter().enumerate() {
            if ix > 0 {
                write!(self.w, ", ")?;
            }
            self.rvalue(item)?;
        }
        write!(self.w, "{close}")?;
        Ok(())
    }

    fn invocation(&mut self, inv: &Invocation) -> ConvoyResult<()> {
        write!(self.w, "{}", inv.id)?;
        if let Some(tn) = inv.generic_type_name {
            let name = match tn {
                TypeName::Integer => "integer",
                TypeName::Scalar => "scalar",
                TypeName::Logical => "logical",
            };
            write!(self.w, "<{name}>")?;
        }
        write!(self.w, "(")?;
        for (ix, arg) in inv.arguments.iter().enumerate() {
            if ix > 0 {
                write!(self.w, ", ")?;
            }
            if let Some(id) = &arg.id {
                write!(self.w, "{id} = ")?;
            }
            self.rvalue(&arg.rvalue)?;
        }
        write!(self.w, ")")?;
        Ok(())
    }

    fn literal(&mut self, lit: &Literal) -> ConvoyResult<()> {
        match lit {
            Literal::Numeric(n) => write!(self.w, "{n}")?,
            Literal::String(s) => write!(self.w, "{s:?}")?,
            Literal::Logical(b) => write!(self.w, "{}", if *b { "true" } else { "false" })?,
        }
        Ok(())
    }
}

/// `document` as text.
pub fn to_string(document: &Document) -> ConvoyResult<String> {
    let mut buf = vec![];
    Dumper::new(&mut buf).document(document)?;
    String::from_utf8(buf).context("Dumped graph is not utf8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::*;

    #[test]
    fn dump_small_graph() {
        let doc = Document {
            version: "1.0".into(),
            extensions: vec![vec!["convoy_registry".into(), "convoy".into()]],
            graph_def: GraphDef {
                id: "network".into(),
                parameters: vec!["image".into()],
                results: vec!["output".into()],
                body: vec![
                    assignment("image", invocation("external", &[], &[("shape", ints(&[1, 3, 2, 2]))])),
                    assignment(
                        "output",
                        invocation(
                            "resize",
                            &[ident("image").into()],
                            &[("method", string("bilinear")), ("align_corners", logical(true))],
                        ),
                    ),
                ],
            },
        };
        let text = to_string(&doc).unwrap();
        assert_eq!(
            text,
            "version 1.0;\nextension convoy_registry convoy;\n\ngraph network( image ) -> ( output )\n{\n  image = external(shape = [1, 3, 2, 2]);\n  output = resize(image, method = \"bilinear\", align_corners = true);\n}\n"
        );
    }
}
