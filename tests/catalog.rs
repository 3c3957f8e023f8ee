use image::{Rgba, RgbaImage};
use merlinsbag::config::ImageQuality;
use merlinsbag::{Catalog, CatalogError, Paths};

fn open_catalog() -> (tempfile::TempDir, Catalog) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open(&Paths::in_dir(dir.path())).unwrap();
    (dir, catalog)
}

fn garment(shade: u8) -> RgbaImage {
    RgbaImage::from_pixel(24, 32, Rgba([shade, 40, 90, 255]))
}

#[test]
fn new_ensemble_holds_exactly_its_initial_articles() {
    let (_dir, mut catalog) = open_catalog();
    let ids: Vec<i64> = (0..4)
        .map(|shade| catalog.add_article(&garment(shade * 50), ImageQuality::Low).unwrap())
        .collect();

    let chosen = [ids[0], ids[2], ids[3]];
    let ensemble = catalog.create_ensemble("Weekend", &chosen).unwrap();

    let listed: Vec<i64> = catalog
        .ensemble_articles(ensemble.id)
        .unwrap()
        .iter()
        .map(|article| article.article_id)
        .collect();
    let mut sorted = listed.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, chosen.to_vec());

    let again: Vec<i64> = catalog
        .ensemble_articles(ensemble.id)
        .unwrap()
        .iter()
        .map(|article| article.article_id)
        .collect();
    assert_eq!(listed, again);

    let outside = catalog.articles_not_in_ensemble(ensemble.id).unwrap();
    assert_eq!(outside.len(), 1);
    assert_eq!(outside[0].article_id, ids[1]);
}

#[test]
fn duplicate_titles_are_rejected_after_trimming() {
    let (_dir, mut catalog) = open_catalog();
    catalog.create_ensemble("Office", &[]).unwrap();

    let err = catalog.create_ensemble("  Office ", &[]).unwrap_err();
    assert!(matches!(
        CatalogError::find(&err),
        Some(CatalogError::TitleNotUnique(_))
    ));
    assert_eq!(catalog.ensembles().unwrap().len(), 1);

    catalog.create_ensemble("office", &[]).unwrap();
    assert_eq!(catalog.ensembles().unwrap().len(), 2);
}

#[test]
fn stored_images_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::in_dir(dir.path());
    let article_id = {
        let mut catalog = Catalog::open(&paths).unwrap();
        let id = catalog.add_article(&garment(200), ImageQuality::Low).unwrap();
        catalog.add_article_image(id, &garment(20), ImageQuality::Low).unwrap();
        id
    };

    let catalog = Catalog::open(&paths).unwrap();
    let article = catalog.article(article_id).unwrap().unwrap();
    assert_eq!(article.image_count(), 2);
    assert!(article.images.iter().all(|path| path.exists()));
    assert!(article.thumbnails.iter().all(|path| path.exists()));
}
