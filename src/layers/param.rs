/// A trainable buffer paired with its accumulated gradient.
///
/// Optimizers see a model as an ordered list of these; the order is stable
/// for a given architecture, which is what per-parameter optimizer state
/// relies on.
pub struct Param<'a> {
    pub value: &'a mut [f64],
    pub grad: &'a [f64],
}
