//! Locating the pagination control of a table section and deciding how to
//! reach the next page.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

pub const PAGINATION_SELECTOR: &str = "ul.pagination";
pub const NEXT_ITEM_SELECTOR: &str = "li.pagination__item--arrow-next, li.pagination__item.-next";
/// Matches the clickable part of the next control anywhere in the document.
pub const NEXT_LINK_SELECTOR: &str =
    "li.pagination__item--arrow-next a, li.pagination__item.-next a";

static PAGINATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(PAGINATION_SELECTOR).expect("static selector"));
static NEXT_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(NEXT_ITEM_SELECTOR).expect("static selector"));
static NEXT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(NEXT_LINK_SELECTOR).expect("static selector"));
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("static selector"));

/// One way of finding the pagination list that belongs to a table wrapper.
pub trait PaginationLocator: Sync {
    fn name(&self) -> &'static str;

    fn locate<'a>(&self, wrapper: ElementRef<'a>, document: &'a Html) -> Option<ElementRef<'a>>;
}

/// A `ul.pagination` directly following the wrapper.
pub struct FollowingSibling;

/// The first `ul.pagination` anywhere under the wrapper's parent.
pub struct ParentScope;

/// The first `ul.pagination` of the whole document.
pub struct PageWide;

impl PaginationLocator for FollowingSibling {
    fn name(&self) -> &'static str {
        "following-sibling"
    }

    fn locate<'a>(&self, wrapper: ElementRef<'a>, _document: &'a Html) -> Option<ElementRef<'a>> {
        wrapper
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|sibling| {
                sibling.value().name() == "ul"
                    && sibling
                        .value()
                        .classes()
                        .any(|class| class.contains("pagination"))
            })
    }
}

impl PaginationLocator for ParentScope {
    fn name(&self) -> &'static str {
        "parent-scope"
    }

    fn locate<'a>(&self, wrapper: ElementRef<'a>, _document: &'a Html) -> Option<ElementRef<'a>> {
        wrapper
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|parent| parent.select(&PAGINATION).next())
    }
}

impl PaginationLocator for PageWide {
    fn name(&self) -> &'static str {
        "page-wide"
    }

    fn locate<'a>(&self, _wrapper: ElementRef<'a>, document: &'a Html) -> Option<ElementRef<'a>> {
        document.select(&PAGINATION).next()
    }
}

/// Strategies in the order they are tried.
pub static PAGINATION_LOCATORS: &[&dyn PaginationLocator] =
    &[&FollowingSibling, &ParentScope, &PageWide];

/// Returns the pagination list and the name of the strategy that found it.
pub fn locate_pagination<'a>(
    wrapper: ElementRef<'a>,
    document: &'a Html,
) -> Option<(&'static str, ElementRef<'a>)> {
    PAGINATION_LOCATORS.iter().find_map(|locator| {
        locator
            .locate(wrapper, document)
            .map(|pagination| (locator.name(), pagination))
    })
}

/// Why a page is considered the last one of its section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LastPage {
    NoPagination,
    NoNextControl,
    Disabled,
    NoLink,
}

/// How to get from the current page to the next one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextPage {
    /// The next control is a real link.
    Navigate(Url),
    /// The next control is script driven; click the `nth` element matching
    /// [`NEXT_LINK_SELECTOR`].
    Activate { nth: usize },
    Last(LastPage),
}

fn resolvable_href(href: &str, current_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    current_url.join(href).ok()
}

/// Inspects the next control of `pagination`.
pub fn next_page(pagination: ElementRef<'_>, document: &Html, current_url: &Url) -> NextPage {
    let Some(item) = pagination.select(&NEXT_ITEM).next() else {
        return NextPage::Last(LastPage::NoNextControl);
    };
    if item.value().classes().any(|class| class == "disabled") {
        return NextPage::Last(LastPage::Disabled);
    }
    let Some(link) = item.select(&LINK).next() else {
        return NextPage::Last(LastPage::NoLink);
    };
    if link.value().classes().any(|class| class == "disabled") {
        return NextPage::Last(LastPage::Disabled);
    }

    if let Some(url) = link
        .value()
        .attr("href")
        .and_then(|href| resolvable_href(href, current_url))
    {
        return NextPage::Navigate(url);
    }

    match document
        .select(&NEXT_LINK)
        .position(|candidate| candidate.id() == link.id())
    {
        Some(nth) => NextPage::Activate { nth },
        None => NextPage::Last(LastPage::NoLink),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use scraper::{ElementRef, Html, Selector};
    use url::Url;

    use super::{
        FollowingSibling, LastPage, NextPage, PageWide, PaginationLocator, ParentScope,
        locate_pagination, next_page,
    };

    static WRAPPER: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("div.custom__table-wrapper").unwrap());

    fn wrapper(document: &Html) -> ElementRef<'_> {
        document.select(&WRAPPER).next().unwrap()
    }

    fn current_url() -> Url {
        Url::parse("https://www.shl.com/solutions/products/product-catalog/?type=1").unwrap()
    }

    const SIBLING: &str = r#"<div id="scope">
        <div class="custom__table-wrapper"><table></table></div>
        <ul class="pagination" id="sibling">
            <li class="pagination__item -arrow -next pagination__item--arrow-next">
                <a class="pagination__arrow" href="?start=12&type=1">Next</a>
            </li>
        </ul>
    </div>"#;

    const PARENT: &str = r#"<ul class="pagination" id="elsewhere"></ul>
    <div id="scope">
        <div class="custom__table-wrapper"><table></table></div>
        <nav><ul class="pagination" id="nested"></ul></nav>
    </div>"#;

    const PAGE: &str = r#"<section><div class="custom__table-wrapper"></div></section>
        <footer><ul class="pagination" id="footer"></ul></footer>"#;

    fn located_id<'a>(found: Option<(&'static str, ElementRef<'a>)>) -> Option<(&'static str, &'a str)> {
        found.map(|(name, el)| (name, el.value().id().unwrap_or_default()))
    }

    #[test]
    fn locators_are_tried_in_order() {
        let sibling = Html::parse_document(SIBLING);
        assert_eq!(
            located_id(locate_pagination(wrapper(&sibling), &sibling)),
            Some(("following-sibling", "sibling"))
        );

        let parent = Html::parse_document(PARENT);
        assert_eq!(
            located_id(locate_pagination(wrapper(&parent), &parent)),
            Some(("parent-scope", "nested"))
        );

        let page = Html::parse_document(PAGE);
        assert_eq!(
            located_id(locate_pagination(wrapper(&page), &page)),
            Some(("page-wide", "footer"))
        );
    }

    #[test]
    fn each_locator_works_on_its_own() {
        let parent = Html::parse_document(PARENT);
        assert!(FollowingSibling.locate(wrapper(&parent), &parent).is_none());
        assert!(ParentScope.locate(wrapper(&parent), &parent).is_some());
        assert_eq!(
            PageWide
                .locate(wrapper(&parent), &parent)
                .and_then(|el| el.value().id()),
            Some("elsewhere")
        );
    }

    #[test]
    fn locate_pagination_returns_none_without_controls() {
        let document = Html::parse_document(r#"<div class="custom__table-wrapper"></div>"#);
        assert!(locate_pagination(wrapper(&document), &document).is_none());
    }

    #[test]
    fn next_page_follows_real_links() {
        let document = Html::parse_document(SIBLING);
        let (_, pagination) = locate_pagination(wrapper(&document), &document).unwrap();

        assert_eq!(
            next_page(pagination, &document, &current_url()),
            NextPage::Navigate(
                Url::parse("https://www.shl.com/solutions/products/product-catalog/?start=12&type=1")
                    .unwrap()
            )
        );
    }

    #[test]
    fn next_page_detects_disabled_control() {
        let document = Html::parse_document(
            r#"<div class="custom__table-wrapper"></div>
            <ul class="pagination">
                <li class="pagination__item pagination__item--arrow-next disabled">
                    <span>Next</span>
                </li>
            </ul>"#,
        );
        let (_, pagination) = locate_pagination(wrapper(&document), &document).unwrap();

        assert_eq!(
            next_page(pagination, &document, &current_url()),
            NextPage::Last(LastPage::Disabled)
        );
    }

    #[test]
    fn next_page_without_item_or_link_is_last() {
        let no_item = Html::parse_document(
            r#"<div class="custom__table-wrapper"></div><ul class="pagination"><li>1</li></ul>"#,
        );
        let (_, pagination) = locate_pagination(wrapper(&no_item), &no_item).unwrap();
        assert_eq!(
            next_page(pagination, &no_item, &current_url()),
            NextPage::Last(LastPage::NoNextControl)
        );

        let no_link = Html::parse_document(
            r#"<div class="custom__table-wrapper"></div>
            <ul class="pagination"><li class="pagination__item -next"><span>Next</span></li></ul>"#,
        );
        let (_, pagination) = locate_pagination(wrapper(&no_link), &no_link).unwrap();
        assert_eq!(
            next_page(pagination, &no_link, &current_url()),
            NextPage::Last(LastPage::NoLink)
        );
    }

    #[test]
    fn next_page_activates_script_links_by_document_position() {
        let document = Html::parse_document(
            r##"<div>
                <div class="custom__table-wrapper" id="first"></div>
                <ul class="pagination">
                    <li class="pagination__item--arrow-next"><a href="?start=12&type=2">Next</a></li>
                </ul>
            </div>
            <div>
                <div class="custom__table-wrapper" id="second"></div>
                <ul class="pagination">
                    <li class="pagination__item--arrow-next"><a href="#" data-action="next">Next</a></li>
                </ul>
            </div>"##,
        );
        let second = document
            .select(&WRAPPER)
            .find(|el| el.value().id() == Some("second"))
            .unwrap();
        let (name, pagination) = locate_pagination(second, &document).unwrap();

        assert_eq!(name, "following-sibling");
        assert_eq!(
            next_page(pagination, &document, &current_url()),
            NextPage::Activate { nth: 1 }
        );
    }
}
