use owo_colors::{OwoColorize, Style};

/// Colours scan and control output when stdout is a terminal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    /// Device model names.
    pub(crate) fn model(&self, text: impl AsRef<str>) -> String {
        self.paint(text.as_ref(), Style::new().bold().cyan())
    }

    /// Outcomes the device confirmed.
    pub(crate) fn confirmed(&self, text: impl AsRef<str>) -> String {
        self.paint(text.as_ref(), Style::new().bold().green())
    }

    pub(crate) fn key(&self, text: impl AsRef<str>) -> String {
        self.paint(text.as_ref(), Style::new().dimmed())
    }

    pub(crate) fn value(&self, text: impl AsRef<str>) -> String {
        self.paint(text.as_ref(), Style::new().bold())
    }

    /// Signal strength, shaded by how usable the link is likely to be.
    pub(crate) fn rssi(&self, rssi: Option<i16>, text: impl AsRef<str>) -> String {
        let style = match rssi {
            Some(value) if value >= -70 => Style::new().green(),
            Some(value) if value >= -85 => Style::new().yellow(),
            Some(_value) => Style::new().red(),
            None => Style::new().dimmed(),
        };
        self.paint(text.as_ref(), style)
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.use_colour {
            text.style(style).to_string()
        } else {
            text.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Some(-50))]
    #[case(Some(-80))]
    #[case(Some(-95))]
    #[case(None)]
    fn plain_painter_leaves_rssi_untouched(#[case] rssi: Option<i16>) {
        let painter = Painter::new(false);

        assert_eq!("-80 dBm", painter.rssi(rssi, "-80 dBm"));
    }

    #[test]
    fn colour_painter_wraps_text_in_escape_codes() {
        let painter = Painter::new(true);

        let styled = painter.model("WoHand");

        assert_ne!("WoHand", styled);
        assert!(styled.contains("WoHand"));
    }
}
