/// Document layout engine
///
/// Lays out a quote or invoice onto a paginated A4 canvas: header band,
/// two-column party block, line-item table, totals box, optional
/// currency conversion line and a trailing notes page.
///
/// Once rendering has begun nothing may fail: bad logos, missing
/// conversion rates and unformattable currencies all degrade to a
/// visual fallback. Input validation happens before the first mark.
use crate::{
    error::{ApiError, ApiResult, ValidationError},
    render::{
        compute_totals,
        context::{apply_template, fmt_number, TemplateContext},
        money::{conversion_rate, format_money},
        DocumentPayload, MAX_LINE_ITEMS,
    },
};
use base64::Engine as _;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rect, Rgb,
};
use rand::Rng;

/// Kind of financial document being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Quote,
    Invoice,
}

impl DocumentKind {
    fn title(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "PREVENTIVO",
            DocumentKind::Invoice => "FATTURA",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "quote",
            DocumentKind::Invoice => "invoice",
        }
    }
}

// Geometry in points from the top-left of an A4 page, converted to the
// PDF's bottom-left millimetre space at the drawing boundary.
const PAGE_W_PT: f32 = 595.28;
const PAGE_H_PT: f32 = 841.89;
const PT_TO_MM: f32 = 0.352_778;
const MARGIN_X: f32 = 40.0;
const CONTENT_RIGHT: f32 = 555.0;
const TABLE_START_Y: f32 = 200.0;
const FIRST_ROW_Y: f32 = TABLE_START_Y + 26.0;
const PAGE_BREAK_Y: f32 = 700.0;
const TOP_RESET_Y: f32 = 60.0;
const ROW_PITCH: f32 = 18.0;
const LOGO_SIZE: f32 = 42.0;
const NOTES_WRAP_CHARS: usize = 90;

fn primary() -> Color {
    Color::Rgb(Rgb::new(0.118, 0.227, 0.541, None))
}

fn light() -> Color {
    Color::Rgb(Rgb::new(0.392, 0.455, 0.545, None))
}

fn ink() -> Color {
    Color::Rgb(Rgb::new(0.059, 0.090, 0.165, None))
}

fn tint() -> Color {
    Color::Rgb(Rgb::new(0.925, 0.937, 0.976, None))
}

/// Generate a 6-character uppercase alphanumeric document number
pub fn document_number() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Render a document to PDF bytes
pub fn render_document(
    kind: DocumentKind,
    payload: &DocumentPayload,
    ctx: &TemplateContext,
    number: &str,
) -> ApiResult<Vec<u8>> {
    // All validation sits before the first mark on the canvas
    if payload.line_items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::TooManyItems.into());
    }

    let currency = if payload.currency.trim().is_empty() {
        ctx.defaults.currency.clone()
    } else {
        payload.currency.clone()
    };

    let mut canvas = Canvas::new(kind.title())?;

    draw_header(&canvas, kind, ctx, number, payload.logo.as_deref());
    draw_parties(&canvas, ctx);

    let cursor = draw_line_items(&mut canvas, payload, &currency);
    draw_totals(&mut canvas, payload, ctx, &currency, cursor);
    draw_notes_page(&mut canvas, payload, ctx);

    crate::metrics::DOCUMENTS_RENDERED_TOTAL
        .with_label_values(&[kind.as_str()])
        .inc();
    tracing::debug!(
        "rendered {} #{} with {} items over {} pages",
        kind.as_str(),
        number,
        payload.line_items.len(),
        canvas.pages
    );

    let Canvas { doc, .. } = canvas;
    doc.save_to_bytes()
        .map_err(|e| ApiError::Internal(format!("PDF serialization failed: {}", e)))
}

/// Page/cursor slot for each table row: never past the break line, new
/// page instead, so no row is ever split across pages.
fn row_slots(count: usize) -> Vec<(usize, f32)> {
    let mut slots = Vec::with_capacity(count);
    let mut page = 0usize;
    let mut y = FIRST_ROW_Y;
    for _ in 0..count {
        if y > PAGE_BREAK_Y {
            page += 1;
            y = TOP_RESET_Y;
        }
        slots.push((page, y));
        y += ROW_PITCH;
    }
    slots
}

fn draw_header(
    canvas: &Canvas,
    kind: DocumentKind,
    ctx: &TemplateContext,
    number: &str,
    logo: Option<&str>,
) {
    draw_logo(canvas, logo);

    canvas.text(kind.title(), 22.0, 100.0, 62.0, &canvas.bold, primary());
    canvas.text(
        &format!("Data: {}", ctx.today),
        10.0,
        100.0,
        86.0,
        &canvas.regular,
        light(),
    );
    canvas.text(
        &format!("Documento # {}", number),
        10.0,
        100.0,
        100.0,
        &canvas.regular,
        light(),
    );
}

/// Embed the data-URI logo; any decode failure substitutes a solid
/// placeholder block of the same dimensions. Never fails.
fn draw_logo(canvas: &Canvas, logo: Option<&str>) {
    if let Some(data_uri) = logo {
        if data_uri.starts_with("data:image") {
            match decode_logo(data_uri) {
                Some(img) => {
                    let dpi = 300.0;
                    let natural_w_mm = img.width() as f32 * 25.4 / dpi;
                    let natural_h_mm = img.height() as f32 * 25.4 / dpi;
                    let box_mm = LOGO_SIZE * PT_TO_MM;
                    let scale = (box_mm / natural_w_mm).min(box_mm / natural_h_mm);

                    let pdf_image = Image::from_dynamic_image(&img);
                    pdf_image.add_to_layer(
                        canvas.layer.clone(),
                        ImageTransform {
                            translate_x: Some(Canvas::x(MARGIN_X)),
                            translate_y: Some(Canvas::y(MARGIN_X + LOGO_SIZE)),
                            scale_x: Some(scale),
                            scale_y: Some(scale),
                            dpi: Some(dpi),
                            ..Default::default()
                        },
                    );
                    return;
                }
                None => {
                    tracing::warn!("logo decode failed, substituting placeholder");
                }
            }
        }
    }

    canvas.fill_rect(MARGIN_X, MARGIN_X, LOGO_SIZE, LOGO_SIZE, tint());
}

fn decode_logo(data_uri: &str) -> Option<image::DynamicImage> {
    let encoded = data_uri.split(',').nth(1)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    image::load_from_memory(&bytes).ok()
}

fn draw_parties(canvas: &Canvas, ctx: &TemplateContext) {
    canvas.text("FORNITORE", 11.0, MARGIN_X, 130.0, &canvas.bold, primary());
    canvas.text(&ctx.company.name, 10.0, MARGIN_X, 146.0, &canvas.regular, light());
    let mut y = 158.0;
    for line in ctx.company.address.split('\n') {
        canvas.text(line, 9.0, MARGIN_X, y, &canvas.regular, light());
        y += 12.0;
    }
    canvas.text(
        &format!("P.IVA: {}", ctx.company.tax_id),
        9.0,
        MARGIN_X,
        y,
        &canvas.regular,
        light(),
    );

    canvas.text("CLIENTE", 11.0, 300.0, 130.0, &canvas.bold, primary());
    canvas.text(&ctx.client.name, 10.0, 300.0, 146.0, &canvas.regular, light());
    let mut y = 158.0;
    for line in ctx.client.address.split('\n').filter(|l| !l.is_empty()) {
        canvas.text(line, 9.0, 300.0, y, &canvas.regular, light());
        y += 12.0;
    }
}

/// Emit the line-item table, paginating as needed. Returns the cursor
/// position after the last row.
fn draw_line_items(canvas: &mut Canvas, payload: &DocumentPayload, currency: &str) -> f32 {
    canvas.hline(MARGIN_X, CONTENT_RIGHT, TABLE_START_Y, primary(), 1.0);
    canvas.text("DESCRIZIONE", 10.0, 45.0, 212.0, &canvas.bold, primary());
    canvas.text("QTA", 10.0, 300.0, 212.0, &canvas.bold, primary());
    canvas.text("PREZZO", 10.0, 360.0, 212.0, &canvas.bold, primary());
    canvas.text("TOTALE", 10.0, 450.0, 212.0, &canvas.bold, primary());

    let slots = row_slots(payload.line_items.len());
    let mut last_y = FIRST_ROW_Y - ROW_PITCH;

    for (item, (page, y)) in payload.line_items.iter().zip(slots) {
        while canvas.pages < page + 1 {
            canvas.new_page();
        }

        let line_total = item.quantity * item.unit_price;
        canvas.text(
            &truncate(&item.description, 52),
            10.0,
            45.0,
            y,
            &canvas.regular,
            ink(),
        );
        canvas.text(
            &fmt_number(item.quantity),
            10.0,
            300.0,
            y,
            &canvas.regular,
            ink(),
        );
        canvas.text(
            &format_money(item.unit_price, currency),
            10.0,
            360.0,
            y,
            &canvas.regular,
            ink(),
        );
        canvas.text(
            &format_money(line_total, currency),
            10.0,
            450.0,
            y,
            &canvas.regular,
            ink(),
        );
        last_y = y;
    }

    last_y + ROW_PITCH
}

fn draw_totals(
    canvas: &mut Canvas,
    payload: &DocumentPayload,
    ctx: &TemplateContext,
    currency: &str,
    cursor: f32,
) {
    let totals = compute_totals(&payload.line_items, payload.discount, payload.tax_rate);

    // The totals block never straddles the page break
    let mut y = if cursor + 80.0 > PAGE_BREAK_Y + 60.0 {
        canvas.new_page();
        TOP_RESET_Y
    } else {
        cursor + 10.0
    };

    let label_x = 360.0;
    let value_x = 450.0;
    let box_top = y - 12.0;

    canvas.text("SUBTOTALE", 10.0, label_x, y, &canvas.bold, primary());
    canvas.text(
        &format_money(totals.subtotal, currency),
        10.0,
        value_x,
        y,
        &canvas.regular,
        ink(),
    );
    y += 16.0;

    if totals.discount > 0.0 {
        canvas.text("SCONTO", 10.0, label_x, y, &canvas.bold, primary());
        canvas.text(
            &format!("-{}", format_money(totals.discount, currency)),
            10.0,
            value_x,
            y,
            &canvas.regular,
            ink(),
        );
        y += 16.0;
    }

    canvas.text(
        &format!("IVA {}%", fmt_number(payload.tax_rate)),
        10.0,
        label_x,
        y,
        &canvas.bold,
        primary(),
    );
    canvas.text(
        &format_money(totals.tax, currency),
        10.0,
        value_x,
        y,
        &canvas.regular,
        ink(),
    );
    y += 22.0;

    canvas.text("TOTALE", 11.0, label_x, y, &canvas.bold, primary());
    canvas.text(
        &format_money(totals.total, currency),
        11.0,
        value_x,
        y,
        &canvas.bold,
        primary(),
    );

    // Optional conversion line; unresolvable rates are omitted, not errors
    if let Some(target) = payload.convert_to.as_deref() {
        if target != currency {
            match conversion_rate(currency, target, payload.rate_override) {
                Some(rate) => {
                    y += 16.0;
                    canvas.text(
                        &format!("TOTALE ({})", target),
                        10.0,
                        label_x,
                        y,
                        &canvas.bold,
                        primary(),
                    );
                    canvas.text(
                        &format_money(totals.total * rate, target),
                        10.0,
                        value_x,
                        y,
                        &canvas.regular,
                        ink(),
                    );
                }
                None => {
                    tracing::debug!("no conversion rate for {} -> {}", currency, target);
                }
            }
        }
    }

    // Footer note from the profile defaults, bottom of the totals page
    if !ctx.defaults.footer_note.is_empty() {
        canvas.text(
            &truncate(&ctx.defaults.footer_note, 110),
            7.0,
            MARGIN_X,
            780.0,
            &canvas.regular,
            light(),
        );
    }

    canvas.stroke_rect(label_x - 30.0, box_top, 225.0, y - box_top + 6.0);
}

/// Free-text notes get a dedicated trailing page after template
/// substitution
fn draw_notes_page(canvas: &mut Canvas, payload: &DocumentPayload, ctx: &TemplateContext) {
    let Some(notes) = payload.notes.as_deref() else {
        return;
    };
    let rendered = apply_template(notes, ctx);
    if rendered.trim().is_empty() {
        return;
    }

    canvas.new_page();
    canvas.text("NOTE", 14.0, MARGIN_X, TOP_RESET_Y, &canvas.bold, primary());

    let mut y = TOP_RESET_Y + 24.0;
    for paragraph in rendered.split('\n') {
        for line in wrap_text(paragraph, NOTES_WRAP_CHARS) {
            if y > 780.0 {
                canvas.new_page();
                y = TOP_RESET_Y;
            }
            canvas.text(&line, 11.0, MARGIN_X, y, &canvas.regular, ink());
            y += 16.0;
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn wrap_text(paragraph: &str, max_chars: usize) -> Vec<String> {
    if paragraph.trim().is_empty() {
        return vec![String::new()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Drawing surface tracking the current page layer and fonts
struct Canvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    pages: usize,
}

impl Canvas {
    fn new(title: &str) -> ApiResult<Self> {
        let (doc, page, layer) = PdfDocument::new(
            title,
            Mm(PAGE_W_PT * PT_TO_MM),
            Mm(PAGE_H_PT * PT_TO_MM),
            "content",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ApiError::Internal(format!("font setup failed: {}", e)))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ApiError::Internal(format!("font setup failed: {}", e)))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            pages: 1,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_W_PT * PT_TO_MM),
            Mm(PAGE_H_PT * PT_TO_MM),
            "content",
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.pages += 1;
    }

    fn x(pt: f32) -> Mm {
        Mm(pt * PT_TO_MM)
    }

    /// Convert a from-top point offset into the PDF's bottom-left space
    fn y(pt: f32) -> Mm {
        Mm((PAGE_H_PT - pt) * PT_TO_MM)
    }

    fn text(&self, s: &str, size: f32, x_pt: f32, y_pt: f32, font: &IndirectFontRef, color: Color) {
        self.layer.set_fill_color(color);
        self.layer.use_text(s, size, Self::x(x_pt), Self::y(y_pt), font);
    }

    fn hline(&self, x1_pt: f32, x2_pt: f32, y_pt: f32, color: Color, thickness: f32) {
        self.layer.set_outline_color(color);
        self.layer.set_outline_thickness(thickness);
        let line = Line {
            points: vec![
                (Point::new(Self::x(x1_pt), Self::y(y_pt)), false),
                (Point::new(Self::x(x2_pt), Self::y(y_pt)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(line);
    }

    fn fill_rect(&self, x_pt: f32, y_top_pt: f32, w_pt: f32, h_pt: f32, color: Color) {
        self.layer.set_fill_color(color);
        let rect = Rect::new(
            Self::x(x_pt),
            Self::y(y_top_pt + h_pt),
            Self::x(x_pt + w_pt),
            Self::y(y_top_pt),
        )
        .with_mode(PaintMode::Fill);
        self.layer.add_rect(rect);
    }

    fn stroke_rect(&self, x_pt: f32, y_top_pt: f32, w_pt: f32, h_pt: f32) {
        self.layer.set_outline_color(light());
        self.layer.set_outline_thickness(0.8);
        let rect = Rect::new(
            Self::x(x_pt),
            Self::y(y_top_pt + h_pt),
            Self::x(x_pt + w_pt),
            Self::y(y_top_pt),
        )
        .with_mode(PaintMode::Stroke);
        self.layer.add_rect(rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{context::build_context, LineItem};

    fn payload(items: usize) -> DocumentPayload {
        DocumentPayload {
            line_items: (0..items)
                .map(|i| LineItem {
                    description: format!("Voce {}", i + 1),
                    quantity: 2.0,
                    unit_price: 50.0,
                })
                .collect(),
            tax_rate: 22.0,
            currency: "EUR".into(),
            ..DocumentPayload::default()
        }
    }

    #[test]
    fn document_number_shape() {
        for _ in 0..20 {
            let number = document_number();
            assert_eq!(number.len(), 6);
            assert!(number
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn renders_a_basic_quote() {
        let ctx = build_context(None, None);
        let bytes = render_document(DocumentKind::Quote, &payload(3), &ctx, "ABC123").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn bad_logo_degrades_to_placeholder() {
        let ctx = build_context(None, None);
        let mut p = payload(1);
        p.logo = Some("data:image/png;base64,not-really-base64!!".into());
        let bytes = render_document(DocumentKind::Quote, &p, &ctx, "ABC123").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn unresolvable_conversion_is_omitted_not_an_error() {
        let ctx = build_context(None, None);
        let mut p = payload(1);
        p.convert_to = Some("JPY".into());
        render_document(DocumentKind::Invoice, &p, &ctx, "ABC123").unwrap();
    }

    #[test]
    fn notes_get_a_trailing_page() {
        let ctx = build_context(None, None);
        let mut p = payload(1);
        p.notes = Some("Ciao {{client.name}}".into());
        let with_notes = render_document(DocumentKind::Quote, &p, &ctx, "ABC123").unwrap();
        let without = render_document(DocumentKind::Quote, &payload(1), &ctx, "ABC123").unwrap();
        assert!(with_notes.len() > without.len());
    }

    #[test]
    fn too_many_items_refused_before_rendering() {
        let ctx = build_context(None, None);
        let err =
            render_document(DocumentKind::Quote, &payload(MAX_LINE_ITEMS + 1), &ctx, "ABC123")
                .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::TooManyItems)
        ));
    }

    #[test]
    fn long_item_lists_span_multiple_pages() {
        let ctx = build_context(None, None);
        let short = render_document(DocumentKind::Quote, &payload(3), &ctx, "ABC123").unwrap();
        let long = render_document(DocumentKind::Quote, &payload(80), &ctx, "ABC123").unwrap();
        assert!(long.len() > short.len());
    }

    #[test]
    fn rows_never_cross_the_page_break() {
        let slots = row_slots(100);
        assert_eq!(slots.len(), 100);
        // Every slot sits at or above the break line
        assert!(slots.iter().all(|&(_, y)| y <= PAGE_BREAK_Y));
        // The list is long enough to need at least a second page
        assert!(slots.iter().any(|&(page, _)| page >= 1));
        // Rows on a later page restart from the top margin
        let first_on_second = slots.iter().find(|&&(page, _)| page == 1).unwrap();
        assert_eq!(first_on_second.1, TOP_RESET_Y);
    }

    #[test]
    fn first_page_fills_before_breaking() {
        let slots = row_slots(40);
        let page0_rows = slots.iter().filter(|&&(page, _)| page == 0).count();
        // Rows fit from FIRST_ROW_Y to PAGE_BREAK_Y at ROW_PITCH
        let expected = ((PAGE_BREAK_Y - FIRST_ROW_Y) / ROW_PITCH) as usize + 1;
        assert_eq!(page0_rows, expected);
    }

    #[test]
    fn wraps_long_notes() {
        let text = "parola ".repeat(60);
        let lines = wrap_text(&text, 30);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 30));
    }
}
